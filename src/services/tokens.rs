// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access token lifecycle: reuse, refresh, invalidate, logout.

use crate::db::DocumentStore;
use crate::error::AuthError;
use crate::models::StravaToken;
use crate::services::strava::StravaClient;
use chrono::Utc;
use tokio::sync::Mutex;

/// Margin before token expiration when we proactively refresh (5 minutes).
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// True when a token expiring at `expires_at` must be refreshed at `now`.
pub fn needs_refresh(expires_at: i64, now: i64) -> bool {
    now >= expires_at - TOKEN_REFRESH_MARGIN_SECS
}

/// Hands out valid access tokens, refreshing through Strava when needed.
///
/// The token in use is held in memory after the first lookup. It is
/// dropped on `invalidate()` (a 401 from the API) so the next call goes
/// back to the store instead of reusing a token Strava has revoked.
pub struct TokenManager {
    client: StravaClient,
    store: DocumentStore,
    held: Mutex<Option<StravaToken>>,
}

impl TokenManager {
    pub fn new(client: StravaClient, store: DocumentStore) -> Self {
        Self {
            client,
            store,
            held: Mutex::new(None),
        }
    }

    /// Get a valid access token for the athlete (or the current token
    /// when `athlete_id` is `None`).
    pub async fn ensure_valid(&self, athlete_id: Option<u64>) -> Result<String, AuthError> {
        self.ensure_valid_at(athlete_id, Utc::now().timestamp()).await
    }

    /// `ensure_valid` with an explicit clock (epoch seconds).
    pub async fn ensure_valid_at(
        &self,
        athlete_id: Option<u64>,
        now: i64,
    ) -> Result<String, AuthError> {
        let mut held = self.held.lock().await;

        let token = match held.take() {
            Some(t) if athlete_id.is_none_or(|id| id == t.athlete_id) => t,
            _ => self.load(athlete_id)?.ok_or(AuthError::NoToken)?,
        };

        if !needs_refresh(token.expires_at, now) {
            let access_token = token.access_token.clone();
            *held = Some(token);
            return Ok(access_token);
        }

        let athlete_id = token.athlete_id;
        tracing::info!(
            athlete_id,
            expires_in = token.expires_in(now),
            "Access token expiring, refreshing"
        );

        let response = self.client.refresh_token(&token.refresh_token).await?;
        let updated = token.refreshed(
            response.access_token,
            response.refresh_token,
            response.expires_at,
            Utc::now(),
        );
        self.store.save_token(&updated)?;

        tracing::info!(athlete_id, expires_at = updated.expires_at, "Token refreshed");
        let access_token = updated.access_token.clone();
        *held = Some(updated);
        Ok(access_token)
    }

    /// Forget the in-memory token (after Strava rejected it).
    pub async fn invalidate(&self) {
        if let Some(token) = self.held.lock().await.take() {
            tracing::info!(athlete_id = token.athlete_id, "Discarded rejected access token");
        }
    }

    /// Delete the stored token and deauthorize it with Strava.
    ///
    /// Deauthorization is best effort: the local token is removed even if
    /// Strava cannot be reached. Returns the removed token, if any.
    pub async fn logout(&self, athlete_id: Option<u64>) -> Result<Option<StravaToken>, AuthError> {
        let Some(token) = self.load(athlete_id)? else {
            return Ok(None);
        };

        // Delete first so a failed deauthorize cannot leave a usable token behind.
        self.store.delete_token(token.athlete_id)?;
        self.held.lock().await.take();

        if let Err(e) = self.client.deauthorize(&token.access_token).await {
            tracing::warn!(
                error = %e,
                athlete_id = token.athlete_id,
                "Failed to deauthorize with Strava (local token removed anyway)"
            );
        }

        Ok(Some(token))
    }

    fn load(&self, athlete_id: Option<u64>) -> Result<Option<StravaToken>, AuthError> {
        let token = match athlete_id {
            Some(id) => self.store.get_token(id)?,
            None => self.store.current_token()?,
        };
        Ok(token)
    }
}
