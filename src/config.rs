//! Channel graph configuration using Figment
//!
//! This module provides strongly-typed configuration loading for a channel graph.
//! Configuration is loaded from:
//! 1. a TOML file (base configuration, `config/channels.toml` by default)
//! 2. Environment variables (prefixed with `DAQ_CHANNELS_`, nested keys joined by `__`)
//!
//! # Example
//! ```no_run
//! use daq_channels::config::RuntimeConfig;
//!
//! let config = RuntimeConfig::load()?;
//! config.validate()?;
//! println!("Application: {}", config.application.name);
//! # Ok::<(), daq_channels::ChannelError>(())
//! ```
//!
//! # File layout
//! ```toml
//! [application]
//! name = "bench rig"
//! log_level = "info"
//!
//! [[channels]]
//! name = "line"
//! kind = "buffer"
//! setup = ["64", "\n"]
//! links = ["reading"]
//! ```

use crate::error::{AppResult, ChannelError};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/channels.toml";

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "DAQ_CHANNELS_";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Channel definitions, created in order
    #[serde(default)]
    pub channels: Vec<ChannelDefinition>,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format (pretty, compact, json)
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

/// One channel in the graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelDefinition {
    /// Unique channel name
    pub name: String,
    /// Kind to create it with (e.g. "buffer", "pattern")
    pub kind: String,
    /// Setup parameters, passed as text so channel names resolve
    #[serde(default)]
    pub setup: Vec<String>,
    /// Channels this one fans out to, in order
    #[serde(default)]
    pub links: Vec<String>,
    /// Whether this channel is created at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_name() -> String {
    "daq-channels".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_enabled() -> bool {
    true
}

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const VALID_FORMATS: [&str; 3] = ["pretty", "compact", "json"];

impl RuntimeConfig {
    /// Load configuration from the default file and environment variables
    ///
    /// Environment variables override the file with prefix `DAQ_CHANNELS_`.
    /// Example: `DAQ_CHANNELS_APPLICATION__LOG_LEVEL=debug`
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string (no environment overrides)
    pub fn from_toml_str(text: &str) -> AppResult<Self> {
        let config = Figment::new().merge(Toml::string(text)).extract()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        let level = self.application.log_level.to_lowercase();
        if !VALID_LEVELS.contains(&level.as_str()) {
            return Err(ChannelError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                VALID_LEVELS.join(", ")
            )));
        }

        let format = self.application.log_format.to_lowercase();
        if !VALID_FORMATS.contains(&format.as_str()) {
            return Err(ChannelError::Configuration(format!(
                "Invalid log_format '{}'. Must be one of: {}",
                self.application.log_format,
                VALID_FORMATS.join(", ")
            )));
        }

        // Channel names must be unique and non-empty
        let mut names = HashSet::new();
        for channel in &self.channels {
            if channel.name.trim().is_empty() {
                return Err(ChannelError::Configuration(format!(
                    "Channel of kind '{}' has an empty name",
                    channel.kind
                )));
            }
            if !names.insert(channel.name.as_str()) {
                return Err(ChannelError::DuplicateName(channel.name.clone()));
            }
        }

        // Link targets must be declared
        for channel in &self.channels {
            if let Some(target) = channel.links.iter().find(|t| !names.contains(t.as_str())) {
                return Err(ChannelError::UnknownChannel(format!(
                    "'{}' links to undeclared channel '{}'",
                    channel.name, target
                )));
            }
        }

        Ok(())
    }

    /// Get all enabled channel definitions
    pub fn enabled_channels(&self) -> Vec<&ChannelDefinition> {
        self.channels.iter().filter(|c| c.enabled).collect()
    }
}
