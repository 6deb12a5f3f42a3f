// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from a YAML file and the environment.
//!
//! Priority is environment > config file > defaults. A `.env` file in the
//! working directory is loaded first so local development can keep the
//! Strava client secret out of the config file.

use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

/// Name of the JSON document store inside the data directory.
const STORE_FILE_NAME: &str = "store.json";

/// Strava OAuth application credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    /// Base redirect URI registered with the Strava application.
    pub redirect_uri: Option<String>,
}

impl Credentials {
    /// Host used when building the loopback redirect URI.
    ///
    /// Strava only checks the host against the "Authorization Callback
    /// Domain", so the port and path of a configured URI are ignored.
    pub fn redirect_host(&self) -> String {
        self.redirect_uri
            .as_deref()
            .and_then(|uri| reqwest::Url::parse(uri).ok())
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_else(|| "127.0.0.1".to_string())
    }
}

/// Application configuration, loaded once per invocation.
#[derive(Debug, Clone)]
pub struct Config {
    /// Strava OAuth client ID
    pub strava_client_id: Option<String>,
    /// Strava OAuth client secret
    pub strava_client_secret: Option<String>,
    /// Optional redirect base (only the host is used)
    pub strava_redirect_uri: Option<String>,
    /// Directory holding the document store
    pub data_dir: PathBuf,
    /// Config file that was read, if any
    pub config_file: Option<PathBuf>,
}

/// On-disk config file layout.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    strava: StravaSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StravaSection {
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_uri: Option<String>,
}

impl Config {
    /// Load configuration from the given file (or the default location)
    /// and the process environment.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let path = config_path.unwrap_or_else(Self::default_config_path);
        let file = if path.exists() {
            Some((read_config_file(&path)?, path))
        } else {
            None
        };

        Ok(Self::from_sources(file, |key| env::var(key).ok()))
    }

    /// Merge a parsed config file with environment lookups.
    fn from_sources(
        file: Option<(ConfigFile, PathBuf)>,
        env_var: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let (file_config, config_file) = match file {
            Some((parsed, path)) => (parsed, Some(path)),
            None => (ConfigFile::default(), None),
        };

        // Relative data dirs resolve against the config file's directory
        let file_data_dir = file_config.data_dir.map(|dir| {
            match config_file.as_deref().and_then(Path::parent) {
                Some(parent) if dir.is_relative() => parent.join(dir),
                _ => dir,
            }
        });

        let non_empty = |key: &str| {
            env_var(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            strava_client_id: non_empty("STRAVA_CLIENT_ID").or(file_config.strava.client_id),
            strava_client_secret: non_empty("STRAVA_CLIENT_SECRET")
                .or(file_config.strava.client_secret),
            strava_redirect_uri: non_empty("STRAVA_REDIRECT_URI")
                .or(file_config.strava.redirect_uri),
            data_dir: non_empty("PEDALCAST_DATA_DIR")
                .map(PathBuf::from)
                .or(file_data_dir)
                .unwrap_or_else(Self::default_data_dir),
            config_file,
        }
    }

    /// Strava credentials, or `None` when either the id or secret is missing.
    pub fn credentials(&self) -> Option<Credentials> {
        Some(Credentials {
            client_id: self.strava_client_id.clone()?,
            client_secret: self.strava_client_secret.clone()?,
            redirect_uri: self.strava_redirect_uri.clone(),
        })
    }

    /// Path of the JSON document store.
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(STORE_FILE_NAME)
    }

    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pedalcast")
            .join("config.yaml")
    }

    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pedalcast")
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let contents =
        std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
    if contents.trim().is_empty() {
        return Ok(ConfigFile::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse config file {0}: {1}")]
    Parse(PathBuf, #[source] serde_yaml::Error),
}
