// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Strava activity model for storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored activity record, keyed by the Strava activity ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Strava activity ID (record key)
    pub id: u64,
    /// Strava athlete ID (owner)
    pub athlete_id: u64,
    /// Local bike resolved from the activity's gear (None if unresolved)
    pub bike_id: Option<String>,
    /// Strava gear ID as reported on the activity
    pub strava_gear_id: Option<String>,
    pub name: String,
    /// Legacy activity type (Ride, Run, ...)
    #[serde(rename = "type")]
    pub activity_type: String,
    /// Sport type (Ride, GravelRide, MountainBikeRide, ...)
    pub sport_type: Option<String>,
    pub start_date: DateTime<Utc>,
    pub distance_meters: f64,
    pub moving_time_secs: u64,
    pub elapsed_time_secs: u64,
    pub elevation_gain_meters: f64,
    /// Meters per second
    pub average_speed: f64,
    /// Meters per second
    pub max_speed: f64,
    /// Payload as returned by Strava
    pub raw: serde_json::Value,
    /// When this record was last written by sync
    pub synced_at: DateTime<Utc>,
}
