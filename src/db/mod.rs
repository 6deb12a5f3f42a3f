// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer (local JSON document store).

pub mod store;

pub use store::{DocumentStore, UpsertOutcome};

/// Collection names as constants.
pub mod collections {
    pub const TOKENS: &str = "tokens";
    pub const BIKES: &str = "bikes";
    pub const ACTIVITIES: &str = "activities";
    /// Owned by the maintenance tools; sync never touches these.
    pub const COMPONENTS: &str = "components";
    pub const MAINTENANCE_EVENTS: &str = "maintenanceEvents";
}
