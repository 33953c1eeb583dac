//! Core configuration.
//!
//! [`Config`] holds the coordinator policy knobs and device call tuning. The
//! server deserializes it from its YAML file; every field has a default.

use serde::{Deserialize, Serialize};

use crate::protocol_constants::{API_TIMEOUT_SECS, DEFAULT_VOLUME_STEP};
use crate::services::MixedUnjoinPolicy;

/// Configuration for group coordination and device calls.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Group volume only acts when the addressed device leads a group.
    /// When false, the addressed device is treated as the leader of its
    /// own membership regardless of role.
    pub strict_leader_required: bool,

    /// Handling of unjoin selections that mix leaders and non-leaders.
    pub mixed_unjoin: MixedUnjoinPolicy,

    /// Timeout for a single device request (seconds).
    pub api_timeout_secs: u64,

    /// Step for `volume_up`/`volume_down`, in percent.
    pub volume_step: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strict_leader_required: true,
            mixed_unjoin: MixedUnjoinPolicy::default(),
            api_timeout_secs: API_TIMEOUT_SECS,
            volume_step: DEFAULT_VOLUME_STEP,
        }
    }
}

impl Config {
    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.api_timeout_secs == 0 {
            return Err("api_timeout_secs must be >= 1".to_string());
        }
        if self.volume_step == 0 || self.volume_step > 100 {
            return Err("volume_step must be between 1 and 100".to_string());
        }
        Ok(())
    }
}
