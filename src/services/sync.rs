// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync engine: Strava gear and activities into the local store.
//!
//! Handles the core workflow:
//! 1. Ensure a valid access token
//! 2. Mirror fully-resolved bikes from the athlete profile
//! 3. Compute the activity window (override, full year, or last 30 days)
//! 4. Fetch activity pages and upsert each page by Strava ID
//!
//! Each page is committed as soon as it is merged. A failure aborts the
//! remaining pages but keeps everything already written.

use crate::db::DocumentStore;
use crate::error::{ApiError, SyncError, SyncPhase};
use crate::models::bike::bike_type_from_frame;
use crate::models::{Activity, AthleteSummary, Bike};
use crate::services::strava::{StravaActivitySummary, StravaApi, StravaGear};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// Activities requested per page (Strava's maximum).
pub const PAGE_SIZE: u32 = 200;

/// Default "recent" window.
pub const RECENT_WINDOW_DAYS: i64 = 30;

/// Window used by `--full`.
pub const FULL_WINDOW_DAYS: i64 = 365;

/// Strava marks gear entries carrying full detail with resource_state 3.
const RESOURCE_STATE_DETAILED: u8 = 3;

/// Options from `sync [--since DATE] [--full]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    pub since: Option<NaiveDate>,
    pub full: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BikeCounts {
    pub count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActivityCounts {
    pub added: usize,
    pub updated: usize,
}

/// Result of a sync run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub athlete: AthleteSummary,
    pub bikes: BikeCounts,
    pub activities: ActivityCounts,
    /// Window start actually used
    pub since: DateTime<Utc>,
    /// Non-fatal warnings (rate limit nearly exhausted, ...)
    pub warnings: Vec<String>,
}

/// Start of the activity window.
pub fn sync_window_start(options: &SyncOptions, now: DateTime<Utc>) -> DateTime<Utc> {
    match options.since {
        Some(date) => crate::time_utils::start_of_day_utc(date),
        None if options.full => now - Duration::days(FULL_WINDOW_DAYS),
        None => now - Duration::days(RECENT_WINDOW_DAYS),
    }
}

/// Orchestrates gear then activity sync for the current athlete.
pub struct SyncEngine {
    api: StravaApi,
    store: DocumentStore,
}

impl SyncEngine {
    pub fn new(api: StravaApi, store: DocumentStore) -> Self {
        Self { api, store }
    }

    pub async fn sync(&self, options: SyncOptions) -> Result<SyncSummary, SyncError> {
        self.sync_at(options, Utc::now()).await
    }

    /// `sync` with an explicit clock.
    pub async fn sync_at(
        &self,
        options: SyncOptions,
        now: DateTime<Utc>,
    ) -> Result<SyncSummary, SyncError> {
        // 1. Credentials: fail early with a login hint if there is no token.
        self.api.ensure_token().await?;

        // 2. Gear (bundled into the athlete profile)
        let profile = self
            .api
            .get_athlete()
            .await
            .map_err(|e| SyncError::from_strava(SyncPhase::Gear, e))?;
        let athlete = AthleteSummary {
            athlete_id: profile.id,
            display_name: profile.display_name(),
            location: profile.location(),
        };
        tracing::info!(athlete_id = athlete.athlete_id, "Starting Strava sync");

        let gear_map = self
            .sync_gear(&profile.bikes, now)
            .map_err(|e| SyncError::store(SyncPhase::Gear, e))?;

        // 3. Window
        let since = sync_window_start(&options, now);
        let after = since.timestamp();

        // 4. Pages
        let mut counts = ActivityCounts::default();
        let mut page = 1;
        loop {
            let phase = SyncPhase::Activities { page };
            let items = self
                .api
                .get_activities(after, PAGE_SIZE, page)
                .await
                .map_err(|e| SyncError::from_strava(phase, e))?;
            let fetched = items.len();

            let page_counts = self.merge_page(athlete.athlete_id, items, &gear_map, now, phase)?;
            counts.added += page_counts.added;
            counts.updated += page_counts.updated;

            tracing::info!(
                page,
                fetched,
                added = page_counts.added,
                updated = page_counts.updated,
                "Merged activity page"
            );

            if fetched < PAGE_SIZE as usize {
                break;
            }
            page += 1;
        }

        tracing::info!(
            athlete_id = athlete.athlete_id,
            bikes = gear_map.len(),
            added = counts.added,
            updated = counts.updated,
            "Strava sync complete"
        );

        Ok(SyncSummary {
            athlete,
            bikes: BikeCounts {
                count: gear_map.len(),
            },
            activities: counts,
            since,
            warnings: self.api.take_warnings(),
        })
    }

    /// Mirror bikes; returns Strava gear ID -> local bike ID.
    fn sync_gear(
        &self,
        gear: &[StravaGear],
        now: DateTime<Utc>,
    ) -> Result<HashMap<String, String>, crate::error::StoreError> {
        let mut gear_map = HashMap::new();

        for entry in gear {
            if entry.resource_state != RESOURCE_STATE_DETAILED {
                tracing::debug!(gear_id = ?entry.id, "Skipping gear without full detail");
                continue;
            }
            let Some(gear_id) = entry.id.as_deref().filter(|id| !id.is_empty()) else {
                continue;
            };

            let name = entry
                .name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| gear_id.to_string());
            let bike_type = bike_type_from_frame(entry.frame_type).to_string();

            let bike = match self.store.find_bike_by_gear_id(gear_id)? {
                Some(mut existing) => {
                    // is_default is local state; never touched by sync
                    existing.name = name;
                    existing.notes = gear_notes(entry).or(existing.notes);
                    if entry.frame_type.is_some() {
                        existing.bike_type = bike_type;
                    }
                    existing.distance_meters = entry.distance.or(existing.distance_meters);
                    existing.updated_at = now;
                    existing
                }
                None => {
                    let mut bike = Bike::new(name, bike_type, now);
                    bike.strava_gear_id = Some(gear_id.to_string());
                    bike.notes = gear_notes(entry);
                    bike.distance_meters = entry.distance;
                    tracing::info!(gear_id, bike_id = %bike.id, "New bike from Strava gear");
                    bike
                }
            };

            self.store.upsert_bike(&bike)?;
            gear_map.insert(gear_id.to_string(), bike.id);
        }

        Ok(gear_map)
    }

    /// Upsert one page of activities and count added vs updated.
    fn merge_page(
        &self,
        athlete_id: u64,
        items: Vec<serde_json::Value>,
        gear_map: &HashMap<String, String>,
        now: DateTime<Utc>,
        phase: SyncPhase,
    ) -> Result<ActivityCounts, SyncError> {
        if items.is_empty() {
            return Ok(ActivityCounts::default());
        }

        let mut activities = Vec::with_capacity(items.len());
        for raw in items {
            let summary: StravaActivitySummary = serde_json::from_value(raw.clone())
                .map_err(|e| SyncError::Api {
                    phase,
                    source: ApiError::Decode(e.to_string()),
                })?;
            activities.push(build_activity(athlete_id, summary, raw, gear_map, now));
        }

        // Count from a pre-merge existence check, not from the upsert result.
        let ids: Vec<u64> = activities.iter().map(|a| a.id).collect();
        let existing = self
            .store
            .existing_activity_ids(&ids)
            .map_err(|e| SyncError::store(phase, e))?;

        let mut counts = ActivityCounts::default();
        let mut seen = std::collections::HashSet::new();
        for activity in &activities {
            if existing.contains(&activity.id) || !seen.insert(activity.id) {
                counts.updated += 1;
            } else {
                counts.added += 1;
            }
        }

        self.store
            .upsert_activities(&activities)
            .map_err(|e| SyncError::store(phase, e))?;

        Ok(counts)
    }
}

/// Notes for a bike from the gear's brand, model and description.
fn gear_notes(gear: &StravaGear) -> Option<String> {
    let model: Vec<&str> = [gear.brand_name.as_deref(), gear.model_name.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let mut parts = Vec::new();
    if !model.is_empty() {
        parts.push(model.join(" "));
    }
    if let Some(desc) = gear.description.as_deref().map(str::trim) {
        if !desc.is_empty() {
            parts.push(desc.to_string());
        }
    }

    (!parts.is_empty()).then(|| parts.join(" - "))
}

fn build_activity(
    athlete_id: u64,
    summary: StravaActivitySummary,
    raw: serde_json::Value,
    gear_map: &HashMap<String, String>,
    now: DateTime<Utc>,
) -> Activity {
    let bike_id = summary
        .gear_id
        .as_deref()
        .and_then(|gear_id| gear_map.get(gear_id))
        .cloned();

    Activity {
        id: summary.id,
        athlete_id,
        bike_id,
        strava_gear_id: summary.gear_id,
        name: summary.name,
        activity_type: summary.activity_type,
        sport_type: summary.sport_type,
        start_date: summary.start_date,
        distance_meters: summary.distance,
        moving_time_secs: summary.moving_time,
        elapsed_time_secs: summary.elapsed_time,
        elevation_gain_meters: summary.total_elevation_gain,
        average_speed: summary.average_speed,
        max_speed: summary.max_speed,
        raw,
        synced_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_window_since_override_wins() {
        let options = SyncOptions {
            since: NaiveDate::from_ymd_opt(2025, 1, 1),
            full: true,
        };
        assert_eq!(
            sync_window_start(&options, now()),
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_window_full_and_recent() {
        let full = SyncOptions {
            since: None,
            full: true,
        };
        assert_eq!(sync_window_start(&full, now()), now() - Duration::days(365));
        assert_eq!(
            sync_window_start(&SyncOptions::default(), now()),
            now() - Duration::days(30)
        );
    }

    fn gear(json: serde_json::Value) -> StravaGear {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_gear_notes() {
        let g = gear(serde_json::json!({
            "id": "b1",
            "brand_name": "Specialized",
            "model_name": "Tarmac",
            "description": "race bike"
        }));
        assert_eq!(
            gear_notes(&g).as_deref(),
            Some("Specialized Tarmac - race bike")
        );
        assert_eq!(gear_notes(&gear(serde_json::json!({ "id": "b2" }))), None);
    }

    #[test]
    fn test_build_activity_resolves_bike() {
        let raw = serde_json::json!({
            "id": 99,
            "name": "Morning Ride",
            "type": "Ride",
            "start_date": "2025-06-01T07:00:00Z",
            "distance": 42000.0,
            "gear_id": "b1"
        });
        let summary: StravaActivitySummary = serde_json::from_value(raw.clone()).unwrap();
        let gear_map = HashMap::from([("b1".to_string(), "local-1".to_string())]);

        let activity = build_activity(7, summary, raw.clone(), &gear_map, now());

        assert_eq!(activity.id, 99);
        assert_eq!(activity.bike_id.as_deref(), Some("local-1"));
        assert_eq!(activity.distance_meters, 42000.0);
        assert_eq!(activity.raw, raw);
    }

    #[test]
    fn test_build_activity_unknown_gear_is_unresolved() {
        let raw = serde_json::json!({
            "id": 100,
            "type": "Ride",
            "start_date": "2025-06-01T07:00:00Z",
            "gear_id": "b404"
        });
        let summary: StravaActivitySummary = serde_json::from_value(raw.clone()).unwrap();

        let activity = build_activity(7, summary, raw, &HashMap::new(), now());

        assert_eq!(activity.bike_id, None);
        assert_eq!(activity.strava_gear_id.as_deref(), Some("b404"));
    }
}
