// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Athlete profile fields surfaced to the CLI.

use serde::{Deserialize, Serialize};

/// Identity of the authenticated Strava athlete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AthleteSummary {
    /// Strava athlete ID
    pub athlete_id: u64,
    /// "Firstname Lastname" as shown on Strava
    pub display_name: String,
    /// "City, State, Country" with missing parts omitted
    pub location: Option<String>,
}
