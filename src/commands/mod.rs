// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! CLI subcommands.

pub mod auth;
pub mod sync_cmd;

pub use auth::AuthCommand;
pub use sync_cmd::SyncCommand;
