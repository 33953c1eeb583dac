//! Server configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::Path;

use anyhow::{Context, Result};
use linkplay_core::{Config, DeviceConfig, MixedUnjoinPolicy};
use serde::Deserialize;

/// Server configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to bind the HTTP server to.
    /// Override: `LINKPLAY_BIND_PORT`
    pub bind_port: u16,

    /// Devices to probe and register at startup.
    pub devices: Vec<DeviceConfig>,

    /// Group volume only acts on an addressed group leader.
    /// Override: `LINKPLAY_STRICT_LEADER`
    pub strict_leader_required: bool,

    /// Handling of unjoin requests mixing leaders and non-leaders.
    pub mixed_unjoin: MixedUnjoinPolicy,

    /// Timeout for a single device request (seconds).
    pub api_timeout_secs: u64,

    /// Step for volume up/down (percent).
    pub volume_step: u8,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let core = Config::default();
        Self {
            bind_port: 49500,
            devices: Vec::new(),
            strict_leader_required: core.strict_leader_required,
            mixed_unjoin: core.mixed_unjoin,
            api_timeout_secs: core.api_timeout_secs,
            volume_step: core.volume_step,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies overrides looked up by environment variable name.
    ///
    /// Values that do not parse are ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(port) = lookup("LINKPLAY_BIND_PORT").and_then(|v| v.parse().ok()) {
            self.bind_port = port;
        }

        if let Some(strict) = lookup("LINKPLAY_STRICT_LEADER").and_then(|v| parse_bool(&v)) {
            self.strict_leader_required = strict;
        }

        // Note: LINKPLAY_LOG_LEVEL is handled by clap via #[arg(env = ...)] in main.rs
    }

    /// Converts to linkplay-core's Config type.
    pub fn to_core_config(&self) -> Config {
        Config {
            strict_leader_required: self.strict_leader_required,
            mixed_unjoin: self.mixed_unjoin,
            api_timeout_secs: self.api_timeout_secs,
            volume_step: self.volume_step,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
