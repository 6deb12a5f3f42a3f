// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models stored in the document store.

pub mod activity;
pub mod athlete;
pub mod bike;
pub mod token;

pub use activity::Activity;
pub use athlete::AthleteSummary;
pub use bike::Bike;
pub use token::StravaToken;
