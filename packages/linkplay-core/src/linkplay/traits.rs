//! Trait abstractions for LinkPlay device calls.
//!
//! Device handles depend on [`DeviceTransport`] rather than on the HTTP
//! client directly, so group logic can be exercised against mock devices.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while talking to a LinkPlay device.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// HTTP request to the device failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Device returned a non-success HTTP status.
    #[error("HTTP error {0}: {1}")]
    HttpStatus(u16, String),

    /// Device answered but refused the command.
    #[error("command rejected: {0}")]
    Rejected(String),

    /// Failed to parse the device response.
    #[error("failed to parse device response: {0}")]
    Parse(String),
}

/// Convenient Result alias for device calls.
pub type DeviceResult<T> = Result<T, DeviceError>;

impl DeviceError {
    /// Returns true if the call may succeed when repeated.
    ///
    /// Only network timeouts qualify; a device that rejected a command
    /// will reject it again.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            DeviceError::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}

/// Opaque request/response channel to a single device.
///
/// `host` addresses the device, `command` is a LinkPlay API command string
/// (see [`commands`](super::commands)). The raw response body is returned.
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// Sends one command to the device at `host`.
    async fn send(&self, host: &str, command: &str) -> DeviceResult<String>;
}
