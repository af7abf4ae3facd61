//! Application configuration.
//!
//! Layers, lowest precedence first: built-in defaults, the TOML file given by
//! `--config`, `CLANWATCH_*` environment variables, then CLI flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clanwatch_core::Tag;
use clanwatch_ledger::StoreConfig;
use clanwatch_reconciler::{LoopConfig, ReconcilerConfig};
use clanwatch_roster::RosterConfig;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("missing required setting: {0}")]
    Missing(&'static str),
}

impl ConfigError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key,
            reason: reason.into(),
        }
    }
}

/// `[store]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        let store = StoreConfig::default();
        Self {
            url: store.url,
            namespace: store.namespace,
            database: store.database,
            username: None,
            password: None,
        }
    }
}

impl StoreSettings {
    /// Build the ledger connection config. Credentials are used only when
    /// both halves are present.
    #[must_use]
    pub fn to_store_config(&self) -> StoreConfig {
        let config = StoreConfig {
            url: self.url.clone(),
            namespace: self.namespace.clone(),
            database: self.database.clone(),
            credentials: None,
        };

        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => config.with_credentials(user.clone(), pass.clone()),
            _ => config,
        }
    }
}

/// `[schedule]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    pub interval_secs: u64,
    pub promotion_threshold: u32,
    pub outage_threshold: u32,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            interval_secs: LoopConfig::default().interval.as_secs(),
            promotion_threshold: ReconcilerConfig::default().promotion_threshold,
            outage_threshold: LoopConfig::default().outage_threshold,
        }
    }
}

/// `[notify]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NotifySettings {
    pub webhook_url: Option<Url>,
    /// Request timeout for webhook delivery.
    pub timeout_secs: Option<u64>,
}

impl NotifySettings {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(10))
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub roster: RosterConfig,
    pub store: StoreSettings,
    pub schedule: ScheduleSettings,
    pub notify: NotifySettings,
}

/// Settings passed on the command line. `None` leaves the loaded value alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub group_tag: Option<String>,
    pub db_url: Option<String>,
    pub interval_secs: Option<u64>,
}

impl AppConfig {
    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid configuration.
    pub fn from_toml(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Read and parse a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents, path)
    }

    /// Load from an optional file, then apply the process environment and
    /// the CLI overrides, then validate.
    ///
    /// # Errors
    ///
    /// Returns an error if any layer is invalid or required settings are
    /// missing.
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Self, ConfigError> {
        Self::load_with(path, overrides, |key| std::env::var(key).ok())
    }

    /// [`AppConfig::load`] with the environment read through `lookup`.
    ///
    /// # Errors
    ///
    /// Same as [`AppConfig::load`].
    pub fn load_with<F>(
        path: Option<&Path>,
        overrides: &Overrides,
        lookup: F,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(lookup)?;
        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Overlay `CLANWATCH_*` variables read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if `CLANWATCH_WEBHOOK_URL` is not a valid URL.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("CLANWATCH_API_URL") {
            self.roster.base_url = url;
        }
        if let Some(tag) = lookup("CLANWATCH_GROUP_TAG") {
            self.roster.group_tag = tag;
        }
        if let Some(token) = lookup("CLANWATCH_TOKEN") {
            self.roster.token = token;
        }
        if let Some(url) = lookup("CLANWATCH_DB_URL") {
            self.store.url = url;
        }
        if let Some(user) = lookup("CLANWATCH_DB_USER") {
            self.store.username = Some(user);
        }
        if let Some(pass) = lookup("CLANWATCH_DB_PASS") {
            self.store.password = Some(pass);
        }
        if let Some(url) = lookup("CLANWATCH_WEBHOOK_URL") {
            let url = Url::parse(&url)
                .map_err(|e| ConfigError::invalid("CLANWATCH_WEBHOOK_URL", e.to_string()))?;
            self.notify.webhook_url = Some(url);
        }
        Ok(())
    }

    /// Apply command-line overrides.
    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(tag) = &overrides.group_tag {
            self.roster.group_tag.clone_from(tag);
        }
        if let Some(url) = &overrides.db_url {
            self.store.url.clone_from(url);
        }
        if let Some(secs) = overrides.interval_secs {
            self.schedule.interval_secs = secs;
        }
    }

    /// Check the settings every command needs.
    ///
    /// # Errors
    ///
    /// Returns an error for a missing or malformed group tag, a missing
    /// token, or a zero interval.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.group_tag()?;
        if self.roster.token.trim().is_empty() {
            return Err(ConfigError::Missing("roster.token (or CLANWATCH_TOKEN)"));
        }
        if self.schedule.interval_secs == 0 {
            return Err(ConfigError::invalid(
                "schedule.interval_secs",
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    /// The watched group's tag.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag is missing or malformed.
    pub fn group_tag(&self) -> Result<Tag, ConfigError> {
        if self.roster.group_tag.trim().is_empty() {
            return Err(ConfigError::Missing(
                "roster.group_tag (or CLANWATCH_GROUP_TAG)",
            ));
        }
        Tag::new(self.roster.group_tag.as_str())
            .map_err(|e| ConfigError::invalid("roster.group_tag", e.to_string()))
    }

    #[must_use]
    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            interval: Duration::from_secs(self.schedule.interval_secs),
            outage_threshold: self.schedule.outage_threshold,
        }
    }

    #[must_use]
    pub const fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            promotion_threshold: self.schedule.promotion_threshold,
        }
    }
}
