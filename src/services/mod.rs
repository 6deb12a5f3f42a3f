// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod oauth;
pub mod strava;
pub mod sync;
pub mod tokens;

pub use oauth::{AuthorizationFlow, AuthorizationPrompt, AuthorizedAthlete};
pub use strava::{StravaApi, StravaClient};
pub use sync::{SyncEngine, SyncOptions, SyncSummary};
pub use tokens::TokenManager;
