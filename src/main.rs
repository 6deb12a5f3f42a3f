// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! pedalcast CLI
//!
//! Connects to Strava and keeps a local copy of bikes and rides.

use anyhow::Context;
use clap::{Parser, Subcommand};
use pedalcast::{config::Config, AppState};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

use commands::{AuthCommand, SyncCommand};

#[derive(Parser)]
#[command(name = "pedalcast")]
#[command(version)]
#[command(about = "Cycling weather and ride history from Strava", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Log progress to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect, inspect or disconnect your Strava account
    Auth(AuthCommand),

    /// Pull bikes and activities from Strava
    Sync(SyncCommand),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config).context("Failed to load configuration")?;
    let state = AppState::open(config).context("Failed to open local store")?;

    match cli.command {
        Commands::Auth(cmd) => cmd.run(&state).await,
        Commands::Sync(cmd) => cmd.run(&state).await,
    }
}

/// Initialize logging to stderr; `PEDALCAST_LOG=json` selects JSON lines.
fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "pedalcast=debug,info"
    } else {
        "pedalcast=info,warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let json = std::env::var("PEDALCAST_LOG").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .with_current_span(true)
            .flatten_event(true)
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json).then(|| {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}
