//! Recommendation pipeline
//!
//! Composes the two breaker-guarded upstream calls and the terminal trending
//! fallback into one response. The pipeline holds no per-request state; it
//! recovers from upstream failures by substituting defaults (user profile) or
//! escalating to the trending list (content), and only reports an error when
//! every fallback is exhausted.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{error, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::upstream::{Movie, UpstreamClient, UserProfile};

/// Preferences substituted when the user profile upstream is unavailable
pub const DEFAULT_PREFERENCES: [&str; 2] = ["Comedy", "Family"];

/// Fixed message attached to the trending fallback response
pub const DEGRADED_MESSAGE: &str =
    "Our recommendation service is temporarily degraded. Here are some trending movies.";

/// Fixed error string returned when every fallback failed
pub const UNAVAILABLE_MESSAGE: &str =
    "All services are currently unavailable. Please try again shortly.";

/// Upstream names as reported in `fallback_triggered_for`
pub const USER_PROFILE_SERVICE: &str = "user-profile-service";
pub const CONTENT_SERVICE: &str = "content-service";

/// Resolved preferences echoed back to the caller
#[derive(Debug, Clone, Serialize)]
pub struct UserPreferences {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub preferences: Vec<String>,
}

/// What a recommendation request resolved to; the HTTP layer maps this onto
/// response bodies and status codes
#[derive(Debug)]
pub enum RecommendationOutcome {
    /// Content resolved; preferences may or may not have fallen back
    Normal {
        user_preferences: UserPreferences,
        recommendations: Vec<Movie>,
        fallback_triggered_for: Option<String>,
    },
    /// Content was unavailable but the trending list answered
    Degraded {
        trending: Vec<Value>,
        fallback_triggered_for: String,
    },
    /// Every fallback failed
    Unavailable { fallback_triggered_for: String },
}

/// Orchestrates the two breakers and the terminal trending fallback
pub struct RecommendationPipeline {
    upstream: UpstreamClient,
    user_profile_breaker: Arc<CircuitBreaker>,
    content_breaker: Arc<CircuitBreaker>,
}

impl RecommendationPipeline {
    pub fn new(
        upstream: UpstreamClient,
        user_profile_breaker: Arc<CircuitBreaker>,
        content_breaker: Arc<CircuitBreaker>,
    ) -> Self {
        Self {
            upstream,
            user_profile_breaker,
            content_breaker,
        }
    }

    /// Composes a recommendation for `user_id`, degrading step by step as
    /// upstreams fail
    pub async fn recommend(&self, user_id: &str) -> RecommendationOutcome {
        let mut fallbacks: Vec<&str> = Vec::new();

        // Step A: user preferences, defaulting on any failure or rejection
        let profile = match self
            .user_profile_breaker
            .execute(|| self.upstream.fetch_user_profile(user_id))
            .await
        {
            Ok(profile) => profile,
            Err(err) => {
                warn!(
                    upstream = USER_PROFILE_SERVICE,
                    %user_id,
                    error = %err,
                    "User profile unavailable, substituting default preferences"
                );
                fallbacks.push(USER_PROFILE_SERVICE);
                UserProfile {
                    user_id: user_id.to_string(),
                    preferences: DEFAULT_PREFERENCES
                        .iter()
                        .map(|genre| genre.to_string())
                        .collect(),
                }
            }
        };

        // Step B: content matching the resolved preferences
        let genres = profile.preferences.join(",");
        let movies = match self
            .content_breaker
            .execute(|| self.upstream.fetch_movies(&genres))
            .await
        {
            Ok(movies) => Some(movies),
            Err(err) => {
                warn!(
                    upstream = CONTENT_SERVICE,
                    %genres,
                    error = %err,
                    "Content unavailable, escalating to trending fallback"
                );
                fallbacks.push(CONTENT_SERVICE);
                None
            }
        };

        match movies {
            // Step D: normal response; the flag is present only when a
            // fallback actually triggered
            Some(recommendations) => RecommendationOutcome::Normal {
                user_preferences: UserPreferences {
                    user_id: profile.user_id,
                    preferences: profile.preferences,
                },
                recommendations,
                fallback_triggered_for: if fallbacks.is_empty() {
                    None
                } else {
                    Some(fallbacks.join(", "))
                },
            },
            // Step C: terminal trending fallback, no breaker
            None => {
                let fallback_triggered_for = fallbacks.join(", ");
                match self.upstream.fetch_trending().await {
                    Ok(trending) => RecommendationOutcome::Degraded {
                        trending,
                        fallback_triggered_for,
                    },
                    Err(err) => {
                        error!(
                            error = %err,
                            "Trending fallback failed, no response path left"
                        );
                        RecommendationOutcome::Unavailable {
                            fallback_triggered_for,
                        }
                    }
                }
            }
        }
    }
}
