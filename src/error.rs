// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error types for storage, Strava API access, authorization and sync.
//!
//! Lower layers return their own error type; `SyncError` wraps them with
//! the phase that failed so the CLI can print a single actionable line.

use std::fmt;
use std::path::PathBuf;

/// Document store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Non-2xx responses and transport failures from the Strava REST API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Strava API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Strava request failed: {0}")]
    Transport(String),

    #[error("Strava response could not be parsed: {0}")]
    Decode(String),
}

impl ApiError {
    /// HTTP status for `Status` errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Strava invalidated the token server-side.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(429)
    }
}

/// Authorization and token lifecycle failures.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error(
        "Strava credentials are not configured. Set STRAVA_CLIENT_ID and \
         STRAVA_CLIENT_SECRET or add them to the config file."
    )]
    MissingCredentials,

    #[error("no token: not logged in to Strava. Run `pedalcast auth login` first.")]
    NoToken,

    #[error("Strava authorization was denied: {0}")]
    Denied(String),

    #[error("Timed out after {0} seconds waiting for the Strava authorization callback")]
    Timeout(u64),

    #[error("Token exchange failed with HTTP {status}: {body}")]
    TokenExchange { status: u16, body: String },

    #[error(
        "Token refresh failed with HTTP {status}: {body}. \
         Run `pedalcast auth login` to re-authorize."
    )]
    RefreshFailed { status: u16, body: String },

    #[error("Strava rejected the access token. Run `pedalcast auth login` to re-authorize.")]
    Reauthorize,

    #[error("Token endpoint request failed: {0}")]
    Request(String),

    #[error("Callback listener error: {0}")]
    Listener(#[from] std::io::Error),

    #[error("Failed to fetch athlete profile: {0}")]
    Profile(#[source] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from authenticated API calls: either the token could not be
/// produced (or was rejected), or the request itself failed.
#[derive(Debug, thiserror::Error)]
pub enum StravaError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// The sync step that was running when an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Gear,
    Activities { page: u32 },
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncPhase::Gear => write!(f, "syncing gear"),
            SyncPhase::Activities { page } => write!(f, "syncing activities (page {})", page),
        }
    }
}

/// Sync failures, always prefixed with "Sync failed".
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Sync failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Sync failed while {phase}: {source}")]
    Api {
        phase: SyncPhase,
        #[source]
        source: ApiError,
    },

    #[error("Sync failed while {phase}: {source}")]
    Store {
        phase: SyncPhase,
        #[source]
        source: StoreError,
    },
}

impl SyncError {
    /// Attach phase context to an error from an authenticated call.
    pub fn from_strava(phase: SyncPhase, err: StravaError) -> Self {
        match err {
            StravaError::Auth(e) => SyncError::Auth(e),
            StravaError::Api(source) => SyncError::Api { phase, source },
        }
    }

    pub fn store(phase: SyncPhase, source: StoreError) -> Self {
        SyncError::Store { phase, source }
    }

    /// True when the user has to run `auth login` again.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            SyncError::Auth(AuthError::NoToken)
                | SyncError::Auth(AuthError::Reauthorize)
                | SyncError::Auth(AuthError::RefreshFailed { .. })
        )
    }
}
