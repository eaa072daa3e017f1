//! HTTP surface for the recommendation service
//!
//! Routes requests to the pipeline, the metrics view and the admin reset, and
//! answers unknown routes with a structured 404 body.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode, Uri},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerMetrics};
use crate::pipeline::{
    RecommendationOutcome, RecommendationPipeline, UserPreferences, DEGRADED_MESSAGE,
    UNAVAILABLE_MESSAGE,
};
use crate::upstream::Movie;

pub static START_TIME: Lazy<Instant> = Lazy::new(Instant::now);

/// Shared application state
pub struct AppState {
    pub pipeline: RecommendationPipeline,
    pub user_profile_breaker: Arc<CircuitBreaker>,
    pub content_breaker: Arc<CircuitBreaker>,
}

/// Recommendation response body (JSON), normal shape
#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    #[serde(rename = "userPreferences")]
    pub user_preferences: UserPreferences,
    pub recommendations: Vec<Movie>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_triggered_for: Option<String>,
}

/// Recommendation response body (JSON), trending fallback shape
#[derive(Debug, Serialize)]
pub struct TrendingFallbackResponse {
    pub message: &'static str,
    pub trending: Vec<Value>,
    pub fallback_triggered_for: String,
}

/// Recommendation response body (JSON), all fallbacks exhausted
#[derive(Debug, Serialize)]
pub struct UnavailableResponse {
    pub error: &'static str,
    pub fallback_triggered_for: String,
}

/// Snapshot of both named breakers
#[derive(Debug, Serialize)]
pub struct BreakerMetricsResponse {
    #[serde(rename = "userProfileCircuitBreaker")]
    pub user_profile: CircuitBreakerMetrics,
    #[serde(rename = "contentCircuitBreaker")]
    pub content: CircuitBreakerMetrics,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// GET /recommendations/{userId} - Compose a recommendation via the pipeline
async fn recommendations_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    log::info!("Recommendation request: user_id={}", user_id);

    match state.pipeline.recommend(&user_id).await {
        RecommendationOutcome::Normal {
            user_preferences,
            recommendations,
            fallback_triggered_for,
        } => (
            StatusCode::OK,
            Json(RecommendationResponse {
                user_preferences,
                recommendations,
                fallback_triggered_for,
            }),
        )
            .into_response(),
        RecommendationOutcome::Degraded {
            trending,
            fallback_triggered_for,
        } => (
            StatusCode::OK,
            Json(TrendingFallbackResponse {
                message: DEGRADED_MESSAGE,
                trending,
                fallback_triggered_for,
            }),
        )
            .into_response(),
        RecommendationOutcome::Unavailable {
            fallback_triggered_for,
        } => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(UnavailableResponse {
                error: UNAVAILABLE_MESSAGE,
                fallback_triggered_for,
            }),
        )
            .into_response(),
    }
}

/// GET /metrics/circuit-breakers - Snapshot of both breakers
async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(BreakerMetricsResponse {
        user_profile: state.user_profile_breaker.metrics(),
        content: state.content_breaker.metrics(),
    })
}

/// POST /admin/reset-circuit-breakers - Force both breakers back to closed
async fn reset_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.user_profile_breaker.reset();
    state.content_breaker.reset();

    Json(ResetResponse {
        message: "All circuit breakers reset to CLOSED",
    })
}

/// GET /health - Liveness endpoint
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        service: "recommendation-service",
        uptime_seconds: START_TIME.elapsed().as_secs(),
    })
}

/// Catch-all for unknown routes
async fn fallback_handler(method: Method, uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("Route {} {} not found", method, uri.path()),
        }),
    )
}

/// Build the service router with all routes and layers
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // The fallback is attached per route as well so a verb mismatch on a
    // known path answers with the same structured 404 as an unknown path
    Router::new()
        .route(
            "/recommendations/:user_id",
            get(recommendations_handler).fallback(fallback_handler),
        )
        .route(
            "/metrics/circuit-breakers",
            get(metrics_handler).fallback(fallback_handler),
        )
        .route(
            "/admin/reset-circuit-breakers",
            post(reset_handler).fallback(fallback_handler),
        )
        .route("/health", get(health_handler).fallback(fallback_handler))
        .fallback(fallback_handler)
        .layer(cors)
        .with_state(state)
}
