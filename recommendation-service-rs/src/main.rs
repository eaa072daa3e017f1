// recommendation-service-rs/src/main.rs
// Recommendation Service - Fault-Tolerant Aggregation Layer
// Port 8080 - HTTP entry point composing user-profile, content and trending
//
// Implements:
// - Per-upstream circuit breakers guarding every outbound call
// - A degradation pipeline with default preferences and a trending fallback
// - Breaker metrics snapshots and an admin reset endpoint

use std::sync::Arc;

use config_rs::{get_bind_address, get_default_port, get_upstream_url};
use tracing_subscriber::EnvFilter;

use recommendation_service_rs::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use recommendation_service_rs::http::{build_router, AppState, START_TIME};
use recommendation_service_rs::pipeline::{
    RecommendationPipeline, CONTENT_SERVICE, USER_PROFILE_SERVICE,
};
use recommendation_service_rs::upstream::{build_http_client, UpstreamClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let _ = *START_TIME;

    // Use standardized configuration for the bind address and upstream URLs
    let addr = get_bind_address(get_default_port("API"));
    let user_profile_url = get_upstream_url("USER_PROFILE", get_default_port("USER_PROFILE"));
    let content_url = get_upstream_url("CONTENT", get_default_port("CONTENT"));
    let trending_url = get_upstream_url("TRENDING", get_default_port("TRENDING"));

    log::info!("Using user profile upstream: {}", user_profile_url);
    log::info!("Using content upstream: {}", content_url);
    log::info!("Using trending upstream: {}", trending_url);

    // One long-lived HTTP client shared by every outbound caller
    let http = build_http_client()?;
    let upstream = UpstreamClient::new(http, user_profile_url, content_url, trending_url);

    // One breaker per upstream, shared across all in-flight requests
    let user_profile_breaker = Arc::new(CircuitBreaker::new(
        USER_PROFILE_SERVICE,
        CircuitBreakerConfig::default(),
    ));
    let content_breaker = Arc::new(CircuitBreaker::new(
        CONTENT_SERVICE,
        CircuitBreakerConfig::default(),
    ));

    let pipeline = RecommendationPipeline::new(
        upstream,
        Arc::clone(&user_profile_breaker),
        Arc::clone(&content_breaker),
    );

    let state = Arc::new(AppState {
        pipeline,
        user_profile_breaker,
        content_breaker,
    });

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("Recommendation service starting on http://{}", addr);
    println!("Recommendation service listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
