use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

use crate::{normalize::TOMORROW_OFFSET, provider::gismeteo::DEFAULT_BASE_URL};

const DATABASE_FILE: &str = "coordinates.db";

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_token = "..."
/// request_timeout_secs = 10
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Token sent in the `X-Gismeteo-Token` header.
    pub api_token: Option<String>,

    pub base_url: String,

    /// Where the coordinate database lives. Defaults to the platform data directory.
    pub database_path: Option<PathBuf>,

    pub request_timeout_secs: u64,

    /// Slots of the two-day bundle that belong to the rest of today.
    pub tomorrow_offset: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_token: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            database_path: None,
            request_timeout_secs: 10,
            tomorrow_offset: TOMORROW_OFFSET,
        }
    }
}

impl Config {
    /// Load config from disk, or return defaults if it doesn't exist yet.
    /// Environment variables take precedence over the file.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        let mut cfg = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;

            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            // First run: no config file.
            Self::default()
        };

        cfg.apply_env(|name| std::env::var(name).ok());
        Ok(cfg)
    }

    /// Override fields from `API_KEY`, `WEATHER_BOT_DATABASE` and `WEATHER_BOT_BASE_URL`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(token) = var("API_KEY") {
            self.api_token = Some(token);
        }
        if let Some(path) = var("WEATHER_BOT_DATABASE") {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(url) = var("WEATHER_BOT_BASE_URL") {
            self.base_url = url;
        }
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "weather-bot", "weather-bot")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Configured database path, or `coordinates.db` in the platform data directory.
    pub fn database_file_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::project_dirs()?.data_dir().join(DATABASE_FILE)),
        }
    }

    pub fn set_api_token(&mut self, api_token: String) {
        self.api_token = Some(api_token);
    }

    /// Returns the API token, if a non-blank one is present.
    pub fn api_token(&self) -> Option<&str> {
        self.api_token.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
