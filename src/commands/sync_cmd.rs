// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! `sync [--since DATE] [--full]`

use chrono::NaiveDate;
use clap::Args;
use pedalcast::services::SyncOptions;
use pedalcast::time_utils::format_utc_rfc3339;
use pedalcast::AppState;

/// Sync bikes and activities from Strava
#[derive(Args)]
pub struct SyncCommand {
    /// Fetch activities started on or after this date (YYYY-MM-DD)
    #[arg(long)]
    since: Option<NaiveDate>,

    /// Fetch the last 365 days instead of the last 30
    #[arg(long)]
    full: bool,
}

impl SyncCommand {
    pub async fn run(&self, state: &AppState) -> anyhow::Result<()> {
        let engine = state.sync_engine()?;
        let options = SyncOptions {
            since: self.since,
            full: self.full,
        };

        let summary = engine.sync(options).await?;

        println!(
            "Synced {} (athlete {}) since {}",
            summary.athlete.display_name,
            summary.athlete.athlete_id,
            format_utc_rfc3339(summary.since)
        );
        println!("  Bikes:      {}", summary.bikes.count);
        println!(
            "  Activities: {} added, {} updated",
            summary.activities.added, summary.activities.updated
        );
        for warning in &summary.warnings {
            eprintln!("Warning: {}", warning);
        }
        Ok(())
    }
}
