//! # Recommendation Service
//!
//! A fault-tolerant aggregation service that composes a personalized movie
//! recommendation from three independent upstreams.
//!
//! This crate provides:
//!
//! - A per-dependency circuit breaker with timeout wrapping and sliding-window
//!   failure accounting
//! - Typed outbound callers for the user profile, content and trending
//!   upstreams
//! - A degradation pipeline that chains the breakers into a cascade of
//!   fallbacks
//! - An HTTP surface exposing recommendations, breaker metrics and an admin
//!   reset

pub mod circuit_breaker;
pub mod clock;
pub mod error;
pub mod http;
pub mod pipeline;
pub mod upstream;

#[cfg(test)]
mod tests;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitState,
};
pub use clock::{Clock, SystemClock};
pub use error::{Result, ServiceError};
pub use pipeline::{RecommendationOutcome, RecommendationPipeline};
pub use upstream::UpstreamClient;
