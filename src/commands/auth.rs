// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! `auth login|status|logout`

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Subcommand};
use pedalcast::error::AuthError;
use pedalcast::services::oauth::CALLBACK_TIMEOUT;
use pedalcast::time_utils::format_epoch;
use pedalcast::AppState;

/// Authentication commands
#[derive(Args)]
pub struct AuthCommand {
    #[command(subcommand)]
    command: AuthSubcommand,
}

#[derive(Subcommand)]
enum AuthSubcommand {
    /// Authorize pedalcast with Strava
    Login,
    /// Show the stored Strava connection
    Status,
    /// Remove the stored token and revoke access
    Logout,
}

impl AuthCommand {
    pub async fn run(&self, state: &AppState) -> anyhow::Result<()> {
        match self.command {
            AuthSubcommand::Login => login(state).await,
            AuthSubcommand::Status => status(state),
            AuthSubcommand::Logout => logout(state).await,
        }
    }
}

async fn login(state: &AppState) -> anyhow::Result<()> {
    let flow = state.authorization_flow()?;

    let authorized = flow
        .authorize(|prompt| {
            println!("Open this URL in your browser to connect Strava:\n");
            println!("  {}\n", prompt.authorize_url);
            println!(
                "Waiting for authorization (timeout: {} seconds)...",
                CALLBACK_TIMEOUT.as_secs()
            );
        })
        .await
        .context("Strava login failed")?;

    println!(
        "Connected to Strava as {} (athlete {})",
        authorized.athlete.display_name, authorized.athlete.athlete_id
    );
    let scopes: Vec<&str> = authorized.scopes.iter().map(String::as_str).collect();
    println!("Granted scopes: {}", scopes.join(", "));
    Ok(())
}

fn status(state: &AppState) -> anyhow::Result<()> {
    if let Some(path) = &state.config.config_file {
        println!("Config file: {}", path.display());
    }
    if let Some(path) = state.store.path() {
        println!("Data store:  {}", path.display());
    }
    if state.config.credentials().is_none() {
        println!("Strava credentials: not configured");
    }

    let Some(token) = state.store.current_token()? else {
        println!("Not logged in. Run 'pedalcast auth login' to connect Strava.");
        return Ok(());
    };

    let name = token.display_name.as_deref().unwrap_or("unknown athlete");
    println!("Logged in as {} (athlete {})", name, token.athlete_id);
    if let Some(location) = &token.location {
        println!("Location: {}", location);
    }

    let scopes: Vec<&str> = token.scopes.iter().map(String::as_str).collect();
    println!("Scopes: {}", scopes.join(", "));

    let expires = format_epoch(token.expires_at).unwrap_or_else(|| token.expires_at.to_string());
    if token.expires_in(Utc::now().timestamp()) > 0 {
        println!("Access token expires {}", expires);
    } else {
        println!(
            "Access token expired {} (will be refreshed on next sync)",
            expires
        );
    }
    Ok(())
}

async fn logout(state: &AppState) -> anyhow::Result<()> {
    let removed = match state.token_manager() {
        Ok(tokens) => tokens.logout(None).await?,
        // Without credentials we cannot call Strava, but can still forget the token.
        Err(AuthError::MissingCredentials) => match state.store.current_token()? {
            Some(token) => {
                state.store.delete_token(token.athlete_id)?;
                Some(token)
            }
            None => None,
        },
        Err(e) => return Err(e.into()),
    };

    match removed {
        Some(token) => println!("Logged out athlete {}.", token.athlete_id),
        None => println!("Already logged out."),
    }
    Ok(())
}
