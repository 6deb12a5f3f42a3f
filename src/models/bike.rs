// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Bike model. Bikes are created locally or mirrored from Strava gear.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bike type used when Strava does not report a frame type.
pub const DEFAULT_BIKE_TYPE: &str = "road";

/// Stored bike record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bike {
    /// Local identifier (UUID v4), stable across syncs
    pub id: String,
    pub name: String,
    /// road, mountain, gravel, ...
    #[serde(rename = "type")]
    pub bike_type: String,
    /// Strava gear ID ("b12345"), unique when present
    pub strava_gear_id: Option<String>,
    /// At most one bike holds this flag
    pub is_default: bool,
    pub notes: Option<String>,
    /// Odometer reported by Strava (meters)
    #[serde(default)]
    pub distance_meters: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bike {
    /// New non-default bike with a freshly generated local ID.
    pub fn new(name: String, bike_type: String, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            bike_type,
            strava_gear_id: None,
            is_default: false,
            notes: None,
            distance_meters: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Map a Strava `frame_type` code to a bike type.
pub fn bike_type_from_frame(frame_type: Option<u8>) -> &'static str {
    match frame_type {
        Some(1) => "mountain",
        Some(2) => "cyclocross",
        Some(3) => "road",
        Some(4) => "time_trial",
        Some(5) => "gravel",
        _ => DEFAULT_BIKE_TYPE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_bike_is_not_default() {
        let bike = Bike::new("Tarmac".into(), "road".into(), Utc::now());
        assert!(!bike.is_default);
        assert!(bike.strava_gear_id.is_none());
        assert_eq!(bike.id.len(), 36);
    }

    #[test]
    fn test_bike_type_from_frame() {
        assert_eq!(bike_type_from_frame(Some(1)), "mountain");
        assert_eq!(bike_type_from_frame(Some(5)), "gravel");
        assert_eq!(bike_type_from_frame(Some(99)), DEFAULT_BIKE_TYPE);
        assert_eq!(bike_type_from_frame(None), DEFAULT_BIKE_TYPE);
    }

    #[test]
    fn test_type_field_serializes_as_type() {
        let bike = Bike::new("Tarmac".into(), "road".into(), Utc::now());
        let json = serde_json::to_value(&bike).unwrap();
        assert_eq!(json["type"], "road");
        assert!(json.get("bike_type").is_none());
    }
}
