// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! pedalcast: personal cycling data from Strava
//!
//! This crate provides the Strava authorization and sync engine: OAuth
//! login through a loopback callback, token refresh, and idempotent sync
//! of bikes and activities into a local JSON document store.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::{Config, Credentials};
use db::DocumentStore;
use error::{AuthError, StoreError};
use services::{AuthorizationFlow, StravaApi, StravaClient, SyncEngine, TokenManager};

/// Shared state for one CLI invocation.
///
/// The store is opened once and handed to every service explicitly.
pub struct AppState {
    pub config: Config,
    pub store: DocumentStore,
}

impl AppState {
    /// Open the document store configured in `config`.
    pub fn open(config: Config) -> Result<Self, StoreError> {
        let store = DocumentStore::open(config.store_path())?;
        Ok(Self { config, store })
    }

    pub fn credentials(&self) -> Result<Credentials, AuthError> {
        self.config
            .credentials()
            .ok_or(AuthError::MissingCredentials)
    }

    pub fn strava_client(&self) -> Result<StravaClient, AuthError> {
        Ok(StravaClient::new(&self.credentials()?))
    }

    pub fn token_manager(&self) -> Result<TokenManager, AuthError> {
        Ok(TokenManager::new(
            self.strava_client()?,
            self.store.clone(),
        ))
    }

    pub fn authorization_flow(&self) -> Result<AuthorizationFlow, AuthError> {
        let credentials = self.credentials()?;
        Ok(AuthorizationFlow::new(
            StravaClient::new(&credentials),
            self.store.clone(),
            &credentials,
        ))
    }

    /// Sync engine for the current (most recently authorized) athlete.
    pub fn sync_engine(&self) -> Result<SyncEngine, AuthError> {
        let client = self.strava_client()?;
        let tokens = TokenManager::new(client.clone(), self.store.clone());
        let api = StravaApi::new(client, tokens, None);
        Ok(SyncEngine::new(api, self.store.clone()))
    }
}
