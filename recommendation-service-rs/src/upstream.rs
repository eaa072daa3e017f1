//! Outbound HTTP callers for the three upstream services
//!
//! Each call issues a single GET with its own deadline, parses the JSON body
//! and maps failures to the normalized [`ServiceError`] kinds. There are no
//! automatic retries; retry is the caller's policy.

use std::time::Duration;

use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, ServiceError};

/// Caller-layer deadline for the user profile upstream
pub const USER_PROFILE_DEADLINE: Duration = Duration::from_secs(3);
/// Caller-layer deadline for the content upstream
pub const CONTENT_DEADLINE: Duration = Duration::from_secs(3);
/// Caller-layer deadline for the trending upstream
pub const TRENDING_DEADLINE: Duration = Duration::from_secs(5);

/// Default user agent string
const DEFAULT_USER_AGENT: &str = concat!("recommendation-service/", env!("CARGO_PKG_VERSION"));

/// Profile answer from the user profile upstream
#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub preferences: Vec<String>,
}

/// A single catalog entry from the content upstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    #[serde(rename = "movieId")]
    pub movie_id: i64,
    pub title: String,
    pub genre: String,
}

#[derive(Debug, Deserialize)]
struct MovieCatalog {
    movies: Vec<Movie>,
}

#[derive(Debug, Deserialize)]
struct TrendingList {
    // Items are passed through to the caller verbatim
    trending: Vec<Value>,
}

/// Build the standard long-lived HTTP client shared by every caller
pub fn build_http_client() -> Result<Client> {
    let mut headers = header::HeaderMap::new();
    headers.insert(
        header::USER_AGENT,
        header::HeaderValue::from_static(DEFAULT_USER_AGENT),
    );

    let client = Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(30))
        .gzip(true)
        .build()
        .map_err(|e| ServiceError::configuration(format!("Failed to build HTTP client: {}", e)))?;

    Ok(client)
}

/// Typed callers for the three upstream services, sharing one HTTP client
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: Client,
    user_profile_url: String,
    content_url: String,
    trending_url: String,
}

impl UpstreamClient {
    pub fn new(
        http: Client,
        user_profile_url: impl Into<String>,
        content_url: impl Into<String>,
        trending_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            user_profile_url: user_profile_url.into(),
            content_url: content_url.into(),
            trending_url: trending_url.into(),
        }
    }

    /// `GET {user_profile}/users/{id}`
    pub async fn fetch_user_profile(&self, user_id: &str) -> Result<UserProfile> {
        let url = format!("{}/users/{}", self.user_profile_url, user_id);
        debug!(%url, "Calling user profile upstream");

        let request = self.http.get(&url).timeout(USER_PROFILE_DEADLINE);
        self.get_json::<UserProfile>(request).await
    }

    /// `GET {content}/movies?genres=csv`
    pub async fn fetch_movies(&self, genres: &str) -> Result<Vec<Movie>> {
        let url = format!("{}/movies", self.content_url);
        debug!(%url, %genres, "Calling content upstream");

        let request = self
            .http
            .get(&url)
            .query(&[("genres", genres)])
            .timeout(CONTENT_DEADLINE);
        let catalog = self.get_json::<MovieCatalog>(request).await?;
        Ok(catalog.movies)
    }

    /// `GET {trending}/trending`
    pub async fn fetch_trending(&self) -> Result<Vec<Value>> {
        let url = format!("{}/trending", self.trending_url);
        debug!(%url, "Calling trending upstream");

        let request = self.http.get(&url).timeout(TRENDING_DEADLINE);
        let list = self.get_json::<TrendingList>(request).await?;
        Ok(list.trending)
    }

    /// Sends a prepared request and parses the JSON body, mapping non-2xx
    /// answers and transport faults to their error kinds
    async fn get_json<T>(&self, request: reqwest::RequestBuilder) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::upstream(status.as_u16()));
        }

        let body = response.json::<T>().await?;
        Ok(body)
    }
}
