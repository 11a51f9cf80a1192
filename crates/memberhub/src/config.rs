//! Configuration management for memberhub.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::menu::{FetchPolicy, LinkOptions, OrphanPolicy};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "memberhub";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "memberhub.db";

/// Allowed characters for a session slot key.
const SESSION_KEY_PATTERN: &str = r"^[A-Za-z0-9_.:-]+$";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `MEMBERHUB_`)
/// 2. TOML config file at `~/.config/memberhub/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Menu tree configuration.
    pub menu: MenuConfig,
    /// Member session configuration.
    pub session: SessionConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/memberhub/memberhub.db`
    pub database_path: Option<PathBuf>,
}

/// Menu-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuConfig {
    /// What to do with records whose parent cannot be found.
    pub orphan_policy: OrphanPolicy,
    /// How overlapping fetches are reconciled.
    pub fetch_policy: FetchPolicy,
    /// Prefix joined with a linked page's slug to form a link.
    pub page_path_prefix: String,
    /// Link used when a node has neither an explicit link nor a page.
    pub placeholder_href: String,
}

/// Session-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Slot key holding the serialized member session.
    pub key: String,
    /// Path navigated to after signing out.
    pub sign_out_path: String,
}

impl Default for MenuConfig {
    fn default() -> Self {
        let links = LinkOptions::default();
        Self {
            orphan_policy: OrphanPolicy::default(),
            fetch_policy: FetchPolicy::default(),
            page_path_prefix: links.page_path_prefix,
            placeholder_href: links.placeholder_href,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            key: crate::session::SESSION_KEY.to_string(),
            sign_out_path: "/".to_string(),
        }
    }
}

impl MenuConfig {
    /// Link resolution options derived from this configuration.
    #[must_use]
    pub fn link_options(&self) -> LinkOptions {
        LinkOptions {
            page_path_prefix: self.page_path_prefix.clone(),
            placeholder_href: self.placeholder_href.clone(),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `MEMBERHUB_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file).nested())
            .merge(Env::prefixed("MEMBERHUB_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let key_pattern = Regex::new(SESSION_KEY_PATTERN)
            .map_err(|e| Error::internal(format!("bad session key pattern: {e}")))?;
        if !key_pattern.is_match(&self.session.key) {
            return Err(Error::ConfigValidation {
                message: format!(
                    "session key '{}' must be non-empty and match {SESSION_KEY_PATTERN}",
                    self.session.key
                ),
            });
        }

        if !self.session.sign_out_path.starts_with('/') {
            return Err(Error::ConfigValidation {
                message: format!(
                    "sign_out_path must start with '/': {}",
                    self.session.sign_out_path
                ),
            });
        }

        if !self.menu.page_path_prefix.starts_with('/') {
            return Err(Error::ConfigValidation {
                message: format!(
                    "page_path_prefix must start with '/': {}",
                    self.menu.page_path_prefix
                ),
            });
        }

        if self.menu.placeholder_href.is_empty() {
            return Err(Error::ConfigValidation {
                message: "placeholder_href cannot be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }
}
