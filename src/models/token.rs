// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Strava OAuth token record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Stored OAuth tokens for one athlete (keyed by `athlete_id`).
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct StravaToken {
    /// Strava athlete ID (record key)
    pub athlete_id: u64,
    pub access_token: String,
    pub refresh_token: String,
    /// When the access token expires (epoch seconds)
    pub expires_at: i64,
    /// Granted OAuth scopes
    pub scopes: BTreeSet<String>,
    /// Athlete name captured at authorization time
    #[serde(default)]
    pub display_name: Option<String>,
    /// Athlete location captured at authorization time
    #[serde(default)]
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StravaToken {
    /// Seconds until the access token expires (negative once expired).
    pub fn expires_in(&self, now: i64) -> i64 {
        self.expires_at - now
    }

    /// Replace the token pair after a refresh.
    ///
    /// Strava may rotate the refresh token, so the returned one always wins.
    pub fn refreshed(
        mut self,
        access_token: String,
        refresh_token: String,
        expires_at: i64,
        now: DateTime<Utc>,
    ) -> Self {
        self.access_token = access_token;
        self.refresh_token = refresh_token;
        self.expires_at = expires_at;
        self.updated_at = now;
        self
    }
}

// Keep secrets out of logs.
impl fmt::Debug for StravaToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StravaToken")
            .field("athlete_id", &self.athlete_id)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .field("display_name", &self.display_name)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Parse a Strava scope list ("read,activity:read_all").
pub fn parse_scopes(scopes: &str) -> BTreeSet<String> {
    scopes
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> StravaToken {
        let now = Utc::now();
        StravaToken {
            athlete_id: 42,
            access_token: "access-secret".to_string(),
            refresh_token: "refresh-secret".to_string(),
            expires_at: 1_000,
            scopes: parse_scopes("read"),
            display_name: None,
            location: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_parse_scopes() {
        let scopes = parse_scopes("read, activity:read_all,,profile:read_all");
        assert_eq!(scopes.len(), 3);
        assert!(scopes.contains("activity:read_all"));
        assert!(parse_scopes("").is_empty());
    }

    #[test]
    fn test_refreshed_replaces_both_tokens() {
        let original = token();
        let created_at = original.created_at;
        let later = created_at + chrono::Duration::minutes(5);

        let updated = original.refreshed("new-access".into(), "new-refresh".into(), 9_000, later);

        assert_eq!(updated.access_token, "new-access");
        assert_eq!(updated.refresh_token, "new-refresh");
        assert_eq!(updated.expires_at, 9_000);
        assert_eq!(updated.created_at, created_at);
        assert_eq!(updated.updated_at, later);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug = format!("{:?}", token());
        assert!(!debug.contains("access-secret"));
        assert!(!debug.contains("refresh-secret"));
        assert!(debug.contains("athlete_id: 42"));
    }
}
