//! Unit and scenario tests for the recommendation service
//!
//! This module contains tests for the circuit breaker state machine, the
//! degradation pipeline and the HTTP surface.

pub mod pipeline_tests;
