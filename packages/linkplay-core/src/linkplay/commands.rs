//! LinkPlay HTTP API command strings and status parsing.
//!
//! Every device call is a single `command=` query against `/httpapi.asp`.
//! This module only knows how to spell those commands and how to read the
//! `getPlayerStatus` reply; transport lives in [`client`](super::client).

use serde::Deserialize;

use super::traits::{DeviceError, DeviceResult};
use crate::protocol_constants::DEVICE_VOLUME_MAX;

/// Converts a fractional volume to the device's 0-100 scale.
///
/// Out-of-range input is clamped.
#[must_use]
pub fn volume_to_device(level: f64) -> u8 {
    let clamped = level.clamp(0.0, 1.0);
    (clamped * f64::from(DEVICE_VOLUME_MAX)).round() as u8
}

/// Converts a 0-100 device volume to a fraction.
#[must_use]
pub fn volume_from_device(raw: u8) -> f64 {
    f64::from(raw.min(DEVICE_VOLUME_MAX)) / f64::from(DEVICE_VOLUME_MAX)
}

pub fn set_volume(level: f64) -> String {
    format!("setPlayerCmd:vol:{}", volume_to_device(level))
}

pub fn player_status() -> &'static str {
    "getPlayerStatus"
}

/// Joins the receiving device to the group led by `leader_host`.
pub fn join_group(leader_host: &str) -> String {
    format!("ConnectMasterAp:JoinGroupMaster:eth{}:wifi0.0.0.0", leader_host)
}

/// Dissolves the group on a leader, or detaches a follower from its group.
pub fn ungroup() -> &'static str {
    "multiroom:Ungroup"
}

/// Presses a hardware preset key.
pub fn preset(number: u32) -> String {
    format!("MCUKeyShortClick:{}", number)
}

/// Plays a stream or file URL.
pub fn play_url(url: &str) -> String {
    format!("setPlayerCmd:play:{}", url)
}

/// Switches the active input (e.g. `wifi`, `line-in`, `bluetooth`).
pub fn switch_mode(mode: &str) -> String {
    format!("setPlayerCmd:switchmode:{}", mode)
}

/// Input name for network playback.
pub const NETWORK_INPUT: &str = "wifi";

/// Maps a `getPlayerStatus` `mode` code to the input name accepted by
/// `switchmode`. Unknown codes yield `None`.
#[must_use]
pub fn input_for_mode(mode: &str) -> Option<&'static str> {
    match mode {
        "10" | "11" | "12" | "13" | "14" | "15" | "16" | "17" | "18" | "19" | "20" | "31"
        | "32" => Some(NETWORK_INPUT),
        "40" => Some("line-in"),
        "41" => Some("bluetooth"),
        "43" => Some("optical"),
        "47" => Some("line-in2"),
        "51" => Some("udisk"),
        _ => None,
    }
}

/// Subset of the `getPlayerStatus` reply used for volume and snapshots.
///
/// LinkPlay firmware reports every field as a string.
#[derive(Debug, Clone, Deserialize)]
pub struct PlayerStatus {
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub status: String,
    pub vol: String,
}

impl PlayerStatus {
    /// Parses a raw `getPlayerStatus` body.
    pub fn parse(body: &str) -> DeviceResult<Self> {
        serde_json::from_str(body).map_err(|e| DeviceError::Parse(e.to_string()))
    }

    /// Current volume as a fraction in `[0.0, 1.0]`.
    pub fn volume(&self) -> DeviceResult<f64> {
        let raw: u8 = self
            .vol
            .trim()
            .parse()
            .map_err(|_| DeviceError::Parse(format!("invalid volume {:?}", self.vol)))?;
        Ok(volume_from_device(raw))
    }
}
