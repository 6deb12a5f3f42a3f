// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth2 authorization-code flow against a loopback callback listener.
//!
//! 1. Bind an ephemeral loopback port and derive the redirect URI
//! 2. Hand the Strava authorization URL to the caller to display
//! 3. Wait (bounded) for the browser to hit `/callback`
//! 4. Exchange the code for tokens
//! 5. Fetch the athlete profile and store the token under its ID

use crate::config::Credentials;
use crate::db::DocumentStore;
use crate::error::AuthError;
use crate::models::token::parse_scopes;
use crate::models::{AthleteSummary, StravaToken};
use crate::routes::callback::{self, CallbackOutcome};
use crate::services::strava::StravaClient;
use chrono::Utc;
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::net::TcpListener;

/// How long the user has to approve access in the browser.
pub const CALLBACK_TIMEOUT: Duration = Duration::from_secs(120);

/// Scopes requested: profile (for gear) and all activities.
pub const REQUIRED_SCOPES: &str = "read,profile:read_all,activity:read_all";

/// What the user needs to complete authorization in a browser.
#[derive(Debug, Clone)]
pub struct AuthorizationPrompt {
    pub authorize_url: String,
    pub redirect_uri: String,
    /// Opaque `state` value the callback must echo back
    pub state: String,
}

/// Result of a successful authorization.
#[derive(Debug, Clone)]
pub struct AuthorizedAthlete {
    pub athlete: AthleteSummary,
    pub scopes: BTreeSet<String>,
}

/// Runs the authorization-code flow and stores the resulting token.
pub struct AuthorizationFlow {
    client: StravaClient,
    store: DocumentStore,
    redirect_host: String,
    timeout: Duration,
}

impl AuthorizationFlow {
    pub fn new(client: StravaClient, store: DocumentStore, credentials: &Credentials) -> Self {
        Self {
            client,
            store,
            redirect_host: credentials.redirect_host(),
            timeout: CALLBACK_TIMEOUT,
        }
    }

    /// Override the callback timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the flow. `prompt` is called once the listener is bound and
    /// should show the authorization URL to the user.
    pub async fn authorize<F>(&self, prompt: F) -> Result<AuthorizedAthlete, AuthError>
    where
        F: FnOnce(&AuthorizationPrompt),
    {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let port = listener.local_addr()?.port();
        let redirect_uri = format!("http://{}:{}/callback", self.redirect_host, port);
        let state = uuid::Uuid::new_v4().simple().to_string();

        let authorize_url = self
            .client
            .authorize_url(&redirect_uri, REQUIRED_SCOPES, &state);

        tracing::info!(port, "Waiting for Strava authorization callback");
        prompt(&AuthorizationPrompt {
            authorize_url,
            redirect_uri,
            state: state.clone(),
        });

        let (code, granted) = match callback::wait_for_callback(listener, state, self.timeout)
            .await?
        {
            CallbackOutcome::Authorized { code, scope } => (code, scope),
            CallbackOutcome::Denied(error) => {
                tracing::warn!(error = %error, "Strava authorization denied");
                return Err(AuthError::Denied(error));
            }
        };

        tracing::info!("Exchanging authorization code for tokens");
        let tokens = self.client.exchange_code(&code).await?;

        // The token endpoint is not relied on for the athlete ID; ask the API.
        let profile = self
            .client
            .get_athlete(&tokens.access_token)
            .await
            .map_err(AuthError::Profile)?;

        let scopes = parse_scopes(granted.as_deref().unwrap_or(REQUIRED_SCOPES));
        let athlete = AthleteSummary {
            athlete_id: profile.id,
            display_name: profile.display_name(),
            location: profile.location(),
        };

        let now = Utc::now();
        let token = StravaToken {
            athlete_id: athlete.athlete_id,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at: tokens.expires_at,
            scopes: scopes.clone(),
            display_name: Some(athlete.display_name.clone()),
            location: athlete.location.clone(),
            created_at: now,
            updated_at: now,
        };
        self.store.save_token(&token)?;

        tracing::info!(
            athlete_id = athlete.athlete_id,
            name = %athlete.display_name,
            "Strava authorization complete, token stored"
        );

        Ok(AuthorizedAthlete { athlete, scopes })
    }
}
