// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client.
//!
//! Handles:
//! - OAuth code exchange, token refresh and deauthorization
//! - Authenticated REST calls (athlete profile, activity pages)
//! - Rate limit header tracking (advisory warnings, never a hard stop)

use crate::config::Credentials;
use crate::error::{ApiError, AuthError, StravaError};
use crate::services::tokens::TokenManager;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::{Arc, Mutex, PoisonError};

const DEFAULT_API_BASE: &str = "https://www.strava.com/api/v3";
const DEFAULT_OAUTH_BASE: &str = "https://www.strava.com/oauth";

/// Usage fraction of the short-window limit at which we start warning.
const RATE_LIMIT_WARN_PERCENT: u64 = 90;

/// Strava API client (unauthenticated wire layer).
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    api_base: String,
    oauth_base: String,
    client_id: String,
    client_secret: String,
    /// Rate limit headers from the most recent response.
    last_rate_limit: Arc<Mutex<Option<RateLimitStatus>>>,
}

impl StravaClient {
    /// Create a new Strava client with OAuth credentials.
    pub fn new(credentials: &Credentials) -> Self {
        Self::with_base_urls(credentials, DEFAULT_API_BASE, DEFAULT_OAUTH_BASE)
    }

    /// Create a client against non-default endpoints (mock servers).
    pub fn with_base_urls(credentials: &Credentials, api_base: &str, oauth_base: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            oauth_base: oauth_base.trim_end_matches('/').to_string(),
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            last_rate_limit: Arc::new(Mutex::new(None)),
        }
    }

    /// Authorization page URL the user opens in a browser.
    pub fn authorize_url(&self, redirect_uri: &str, scopes: &str, state: &str) -> String {
        format!(
            "{}/authorize?\
             client_id={}&\
             redirect_uri={}&\
             response_type=code&\
             approval_prompt=auto&\
             scope={}&\
             state={}",
            self.oauth_base,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(scopes),
            urlencoding::encode(state)
        )
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AuthError> {
        let response = self
            .http
            .post(format!("{}/token", self.oauth_base))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Request(format!("Token exchange failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status, body = %body, "Strava token exchange failed");
            return Err(AuthError::TokenExchange { status, body });
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::Request(format!("Failed to parse token response: {}", e)))
    }

    /// Refresh an expiring access token.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        let response = self
            .http
            .post(format!("{}/token", self.oauth_base))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Request(format!("Token refresh request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status, "Strava token refresh rejected");
            return Err(AuthError::RefreshFailed { status, body });
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::Request(format!("Failed to parse refresh response: {}", e)))
    }

    /// Deauthorize the application for a user.
    ///
    /// This invalidates all access and refresh tokens for the user
    /// and removes the app from their Strava settings.
    pub async fn deauthorize(&self, access_token: &str) -> Result<(), ApiError> {
        let response = self
            .http
            .post(format!("{}/deauthorize", self.oauth_base))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        self.check_response(response).await?;
        tracing::info!("Strava deauthorization successful");
        Ok(())
    }

    /// GET an API path with a bearer token.
    pub async fn get(
        &self,
        path: &str,
        access_token: &str,
        params: &[(&str, String)],
    ) -> Result<serde_json::Value, ApiError> {
        let url = format!("{}/{}", self.api_base, path.trim_start_matches('/'));

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(params)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let response = self.check_response(response).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Get authenticated athlete profile.
    pub async fn get_athlete(&self, access_token: &str) -> Result<StravaAthlete, ApiError> {
        let value = self.get("athlete", access_token, &[]).await?;
        serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Rate limit headers from the most recent response.
    pub fn last_rate_limit(&self) -> Option<RateLimitStatus> {
        *self
            .last_rate_limit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Record rate limit headers, then turn non-2xx into `ApiError::Status`.
    async fn check_response(
        &self,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ApiError> {
        *self
            .last_rate_limit
            .lock()
            .unwrap_or_else(PoisonError::into_inner) =
            RateLimitStatus::from_headers(response.headers());

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        if status == 429 {
            tracing::warn!("Strava rate limit hit (429)");
        }

        Err(ApiError::Status { status, body })
    }
}

/// Short-window (15 minute) rate limit state from Strava's headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub limit: u64,
    pub usage: u64,
}

impl RateLimitStatus {
    /// Parse `X-RateLimit-Limit: 100,1000` / `X-RateLimit-Usage: 95,400`.
    ///
    /// The first value of each header is the short window.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let first = |name: &str| -> Option<u64> {
            headers
                .get(name)?
                .to_str()
                .ok()?
                .split(',')
                .next()?
                .trim()
                .parse()
                .ok()
        };

        Some(Self {
            limit: first("x-ratelimit-limit")?,
            usage: first("x-ratelimit-usage")?,
        })
    }

    /// True once usage reaches 90% of the limit.
    pub fn is_near_limit(&self) -> bool {
        self.limit > 0 && self.usage * 100 >= self.limit * RATE_LIMIT_WARN_PERCENT
    }
}

/// Token response from Strava (exchange and refresh).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

/// Authenticated athlete profile (`GET /athlete`).
#[derive(Debug, Clone, Deserialize)]
pub struct StravaAthlete {
    pub id: u64,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    /// Bikes bundled into the profile
    #[serde(default)]
    pub bikes: Vec<StravaGear>,
}

impl StravaAthlete {
    pub fn display_name(&self) -> String {
        [self.firstname.as_deref(), self.lastname.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// "City, State, Country" with empty parts skipped.
    pub fn location(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.city, &self.state, &self.country]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(", "))
    }
}

/// Gear entry as bundled into the athlete profile.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaGear {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// 3 means the entry is fully resolved
    #[serde(default)]
    pub resource_state: u8,
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub brand_name: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub frame_type: Option<u8>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Summary activity for list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivitySummary {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub activity_type: String,
    #[serde(default)]
    pub sport_type: Option<String>,
    pub start_date: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub moving_time: u64,
    #[serde(default)]
    pub elapsed_time: u64,
    #[serde(default)]
    pub total_elevation_gain: f64,
    #[serde(default)]
    pub average_speed: f64,
    #[serde(default)]
    pub max_speed: f64,
    #[serde(default)]
    pub gear_id: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// StravaApi - authenticated access with token management
// ─────────────────────────────────────────────────────────────────────────────

/// Authenticated Strava API access.
///
/// Every call first asks the `TokenManager` for a fresh bearer token. A 401
/// discards the held token and fails with a re-authorize error; nothing is
/// retried here.
pub struct StravaApi {
    client: StravaClient,
    tokens: TokenManager,
    athlete_id: Option<u64>,
    warnings: Mutex<Vec<String>>,
}

impl StravaApi {
    /// `athlete_id` selects the token; `None` uses the current token.
    pub fn new(client: StravaClient, tokens: TokenManager, athlete_id: Option<u64>) -> Self {
        Self {
            client,
            tokens,
            athlete_id,
            warnings: Mutex::new(Vec::new()),
        }
    }

    /// Valid access token for this client's athlete.
    pub async fn ensure_token(&self) -> Result<String, AuthError> {
        self.tokens.ensure_valid(self.athlete_id).await
    }

    /// GET a JSON document from an API path.
    pub async fn get(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<serde_json::Value, StravaError> {
        let access_token = self.ensure_token().await?;
        let result = self.client.get(path, &access_token, params).await;
        self.note_rate_limit();

        match result {
            Ok(value) => Ok(value),
            Err(e) if e.is_unauthorized() => {
                tracing::warn!(path, "Strava rejected access token (401)");
                self.tokens.invalidate().await;
                Err(AuthError::Reauthorize.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Authenticated athlete profile, including bundled gear.
    pub async fn get_athlete(&self) -> Result<StravaAthlete, StravaError> {
        let value = self.get("athlete", &[]).await?;
        decode(value)
    }

    /// One page of activities started after `after` (epoch seconds).
    ///
    /// Raw JSON is returned so callers can keep a payload snapshot.
    pub async fn get_activities(
        &self,
        after: i64,
        per_page: u32,
        page: u32,
    ) -> Result<Vec<serde_json::Value>, StravaError> {
        let value = self
            .get(
                "athlete/activities",
                &[
                    ("after", after.to_string()),
                    ("per_page", per_page.to_string()),
                    ("page", page.to_string()),
                ],
            )
            .await?;
        decode(value)
    }

    /// Drain warnings gathered since the last call.
    pub fn take_warnings(&self) -> Vec<String> {
        std::mem::take(&mut *self.warnings.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn note_rate_limit(&self) {
        let Some(rate) = self.client.last_rate_limit() else {
            return;
        };
        if !rate.is_near_limit() {
            return;
        }

        tracing::warn!(
            usage = rate.usage,
            limit = rate.limit,
            "Approaching Strava rate limit"
        );
        let message = format!(
            "Strava rate limit nearly exhausted: {}/{} requests used in the current 15-minute window",
            rate.usage, rate.limit
        );
        let mut warnings = self.warnings.lock().unwrap_or_else(PoisonError::into_inner);
        if warnings.last() != Some(&message) {
            warnings.push(message);
        }
    }
}

fn decode<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, StravaError> {
    serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(limit: &str, usage: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert("X-RateLimit-Limit", HeaderValue::from_str(limit).unwrap());
        h.insert("X-RateLimit-Usage", HeaderValue::from_str(usage).unwrap());
        h
    }

    #[test]
    fn test_rate_limit_uses_short_window() {
        let rate = RateLimitStatus::from_headers(&headers("100,1000", "42,900")).unwrap();
        assert_eq!(rate, RateLimitStatus { limit: 100, usage: 42 });
        assert!(!rate.is_near_limit());
    }

    #[test]
    fn test_rate_limit_threshold() {
        let at = RateLimitStatus::from_headers(&headers("100,1000", "90,0")).unwrap();
        let below = RateLimitStatus::from_headers(&headers("100,1000", "89,0")).unwrap();
        assert!(at.is_near_limit());
        assert!(!below.is_near_limit());
    }

    #[test]
    fn test_rate_limit_missing_or_garbage() {
        assert!(RateLimitStatus::from_headers(&HeaderMap::new()).is_none());
        assert!(RateLimitStatus::from_headers(&headers("abc", "1,2")).is_none());
    }

    #[test]
    fn test_authorize_url() {
        let creds = Credentials {
            client_id: "12345".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: None,
        };
        let client = StravaClient::new(&creds);
        let url = client.authorize_url(
            "http://127.0.0.1:4567/callback",
            "read,activity:read_all",
            "abc",
        );

        assert!(url.starts_with("https://www.strava.com/oauth/authorize?"));
        assert!(url.contains("client_id=12345"));
        assert!(url.contains("redirect_uri=http%3A%2F%2F127.0.0.1%3A4567%2Fcallback"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("scope=read%2Cactivity%3Aread_all"));
        assert!(url.contains("state=abc"));
        assert!(!url.contains("secret"));
    }

    #[test]
    fn test_athlete_display_fields() {
        let athlete: StravaAthlete = serde_json::from_value(serde_json::json!({
            "id": 7,
            "firstname": "Ada",
            "lastname": "Lovelace",
            "city": "London",
            "state": "",
            "country": "United Kingdom"
        }))
        .unwrap();

        assert_eq!(athlete.display_name(), "Ada Lovelace");
        assert_eq!(athlete.location().as_deref(), Some("London, United Kingdom"));
        assert!(athlete.bikes.is_empty());
    }
}
