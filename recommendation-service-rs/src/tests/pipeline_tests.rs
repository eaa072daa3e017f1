//! Scenario tests for the degradation pipeline
//!
//! These tests use WireMock to simulate the three upstream services and
//! verify each step of the fallback cascade.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
    use crate::pipeline::{RecommendationOutcome, RecommendationPipeline};
    use crate::upstream::{build_http_client, UpstreamClient};

    struct Upstreams {
        user_profile: MockServer,
        content: MockServer,
        trending: MockServer,
    }

    async fn start_upstreams() -> Upstreams {
        Upstreams {
            user_profile: MockServer::start().await,
            content: MockServer::start().await,
            trending: MockServer::start().await,
        }
    }

    fn test_breaker_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            request_timeout: Duration::from_millis(500),
            ..CircuitBreakerConfig::default()
        }
    }

    fn build_pipeline(
        upstreams: &Upstreams,
        config: CircuitBreakerConfig,
    ) -> (RecommendationPipeline, Arc<CircuitBreaker>, Arc<CircuitBreaker>) {
        let http = build_http_client().expect("Failed to build HTTP client");
        let upstream = UpstreamClient::new(
            http,
            upstreams.user_profile.uri(),
            upstreams.content.uri(),
            upstreams.trending.uri(),
        );

        let user_profile_breaker =
            Arc::new(CircuitBreaker::new("user-profile-service", config.clone()));
        let content_breaker = Arc::new(CircuitBreaker::new("content-service", config));

        let pipeline = RecommendationPipeline::new(
            upstream,
            Arc::clone(&user_profile_breaker),
            Arc::clone(&content_breaker),
        );
        (pipeline, user_profile_breaker, content_breaker)
    }

    async fn mock_profile(server: &MockServer, user_id: &str, preferences: &[&str]) {
        Mock::given(method("GET"))
            .and(path(format!("/users/{}", user_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "userId": user_id,
                "preferences": preferences,
            })))
            .mount(server)
            .await;
    }

    async fn mock_failure(server: &MockServer) {
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_happy_path_echoes_preferences_and_movies() {
        let upstreams = start_upstreams().await;
        mock_profile(&upstreams.user_profile, "u1", &["Action", "Sci-Fi"]).await;

        Mock::given(method("GET"))
            .and(path("/movies"))
            .and(query_param("genres", "Action,Sci-Fi"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "movies": [
                    {"movieId": 102, "title": "The Dark Knight", "genre": "Action"}
                ]
            })))
            .mount(&upstreams.content)
            .await;

        let (pipeline, _, _) = build_pipeline(&upstreams, test_breaker_config());

        match pipeline.recommend("u1").await {
            RecommendationOutcome::Normal {
                user_preferences,
                recommendations,
                fallback_triggered_for,
            } => {
                assert_eq!(user_preferences.user_id, "u1");
                assert_eq!(user_preferences.preferences, vec!["Action", "Sci-Fi"]);
                assert_eq!(recommendations.len(), 1);
                assert_eq!(recommendations[0].movie_id, 102);
                assert_eq!(recommendations[0].title, "The Dark Knight");
                assert_eq!(recommendations[0].genre, "Action");
                assert!(fallback_triggered_for.is_none());
            }
            other => panic!("expected normal outcome, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_profile_failure_substitutes_default_preferences() {
        let upstreams = start_upstreams().await;
        mock_failure(&upstreams.user_profile).await;

        Mock::given(method("GET"))
            .and(path("/movies"))
            .and(query_param("genres", "Comedy,Family"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "movies": [
                    {"movieId": 7, "title": "Paddington 2", "genre": "Family"}
                ]
            })))
            .mount(&upstreams.content)
            .await;

        let (pipeline, _, _) = build_pipeline(&upstreams, test_breaker_config());

        match pipeline.recommend("u42").await {
            RecommendationOutcome::Normal {
                user_preferences,
                recommendations,
                fallback_triggered_for,
            } => {
                assert_eq!(user_preferences.user_id, "u42");
                assert_eq!(user_preferences.preferences, vec!["Comedy", "Family"]);
                assert_eq!(recommendations.len(), 1);
                assert_eq!(fallback_triggered_for.as_deref(), Some("user-profile-service"));
            }
            other => panic!("expected normal outcome, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_open_profile_breaker_skips_the_network_call() {
        let upstreams = start_upstreams().await;

        // The breaker trips after two consecutive failures; the third
        // recommendation must not reach the upstream at all
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&upstreams.user_profile)
            .await;

        Mock::given(method("GET"))
            .and(path("/movies"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"movies": []})))
            .mount(&upstreams.content)
            .await;

        Mock::given(method("GET"))
            .and(path("/trending"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"trending": []})))
            .mount(&upstreams.trending)
            .await;

        let config = CircuitBreakerConfig {
            consecutive_failure_threshold: 2,
            ..test_breaker_config()
        };
        let (pipeline, user_profile_breaker, _) = build_pipeline(&upstreams, config);

        for _ in 0..3 {
            pipeline.recommend("u1").await;
        }

        assert_eq!(user_profile_breaker.current_state(), CircuitState::Open);
        // Mock expectations verify on drop that only two calls went out
    }

    #[tokio::test]
    async fn test_empty_catalog_is_a_normal_response() {
        let upstreams = start_upstreams().await;
        mock_profile(&upstreams.user_profile, "u1", &["Noir"]).await;

        Mock::given(method("GET"))
            .and(path("/movies"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"movies": []})))
            .mount(&upstreams.content)
            .await;

        // Trending must stay untouched when content answered, even with an
        // empty catalog
        Mock::given(method("GET"))
            .and(path("/trending"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"trending": []})))
            .expect(0)
            .mount(&upstreams.trending)
            .await;

        let (pipeline, _, _) = build_pipeline(&upstreams, test_breaker_config());

        match pipeline.recommend("u1").await {
            RecommendationOutcome::Normal {
                recommendations,
                fallback_triggered_for,
                ..
            } => {
                assert!(recommendations.is_empty());
                assert!(fallback_triggered_for.is_none());
            }
            other => panic!("expected normal outcome, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_content_failure_escalates_to_trending() {
        let upstreams = start_upstreams().await;
        mock_failure(&upstreams.user_profile).await;
        mock_failure(&upstreams.content).await;

        Mock::given(method("GET"))
            .and(path("/trending"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "trending": [
                    {"movieId": 1, "title": "Inception", "genre": "Sci-Fi"}
                ]
            })))
            .mount(&upstreams.trending)
            .await;

        let (pipeline, _, _) = build_pipeline(&upstreams, test_breaker_config());

        match pipeline.recommend("u1").await {
            RecommendationOutcome::Degraded {
                trending,
                fallback_triggered_for,
            } => {
                assert_eq!(trending.len(), 1);
                assert_eq!(trending[0]["title"], "Inception");
                assert_eq!(
                    fallback_triggered_for,
                    "user-profile-service, content-service"
                );
            }
            other => panic!("expected degraded outcome, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_all_upstreams_down_exhausts_the_pipeline() {
        let upstreams = start_upstreams().await;
        mock_failure(&upstreams.user_profile).await;
        mock_failure(&upstreams.content).await;
        mock_failure(&upstreams.trending).await;

        let (pipeline, _, _) = build_pipeline(&upstreams, test_breaker_config());

        match pipeline.recommend("u1").await {
            RecommendationOutcome::Unavailable {
                fallback_triggered_for,
            } => {
                assert_eq!(
                    fallback_triggered_for,
                    "user-profile-service, content-service"
                );
            }
            other => panic!("expected unavailable outcome, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_content_failure_alone_still_reaches_trending() {
        let upstreams = start_upstreams().await;
        mock_profile(&upstreams.user_profile, "u9", &["Drama"]).await;
        mock_failure(&upstreams.content).await;

        Mock::given(method("GET"))
            .and(path("/trending"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"trending": []})))
            .mount(&upstreams.trending)
            .await;

        let (pipeline, _, _) = build_pipeline(&upstreams, test_breaker_config());

        match pipeline.recommend("u9").await {
            RecommendationOutcome::Degraded {
                fallback_triggered_for,
                ..
            } => {
                // Only the content step fell back
                assert_eq!(fallback_triggered_for, "content-service");
            }
            other => panic!("expected degraded outcome, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_slow_content_upstream_hits_the_breaker_timeout() {
        let upstreams = start_upstreams().await;
        mock_profile(&upstreams.user_profile, "u1", &["Action"]).await;

        Mock::given(method("GET"))
            .and(path("/movies"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"movies": []}))
                    .set_delay(Duration::from_millis(400)),
            )
            .mount(&upstreams.content)
            .await;

        Mock::given(method("GET"))
            .and(path("/trending"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"trending": []})))
            .mount(&upstreams.trending)
            .await;

        let config = CircuitBreakerConfig {
            request_timeout: Duration::from_millis(100),
            ..CircuitBreakerConfig::default()
        };
        let (pipeline, _, content_breaker) = build_pipeline(&upstreams, config);

        match pipeline.recommend("u1").await {
            RecommendationOutcome::Degraded {
                fallback_triggered_for,
                ..
            } => {
                assert_eq!(fallback_triggered_for, "content-service");
            }
            other => panic!("expected degraded outcome, got {:?}", other),
        }

        // The timeout was recorded as a failure outcome
        assert_eq!(content_breaker.metrics().failed_calls, 1);
    }
}
