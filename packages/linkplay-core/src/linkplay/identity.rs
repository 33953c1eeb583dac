//! Device identity lookup.
//!
//! Asks a device for its `getStatus` document to learn the UUID and display
//! name it should be registered under. Lookups are never retried: a caller
//! that gets [`ProbeError::Unreachable`] decides itself whether to try again.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::client::{build_command_url, Protocol};
use crate::protocol_constants::{FALLBACK_ID_PREFIX, STATUS_COMMAND};

/// Errors that can occur while probing a device.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Connection failed or timed out.
    #[error("device unreachable: {0}")]
    Unreachable(String),

    /// Device answered with a status that does not identify it.
    #[error("device rejected identity request with HTTP {0}")]
    Rejected(u16),

    /// Device answered OK but the body was not a status document.
    #[error("invalid status document: {0}")]
    Parse(String),
}

impl ProbeError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unreachable(_) => "device_unreachable",
            Self::Rejected(_) => "device_rejected",
            Self::Parse(_) => "invalid_status",
        }
    }
}

/// Convenient Result alias for identity probes.
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Identity reported by a device. Either field may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceIdentity {
    pub uuid: String,
    #[serde(rename = "DeviceName", alias = "name")]
    pub name: String,
}

impl DeviceIdentity {
    /// Stable identifier to register the device under.
    ///
    /// Falls back to `linkplay_<host>` (dots replaced) when the device does
    /// not report a UUID; such ids are not guaranteed to survive a
    /// change of address.
    pub fn unique_id(&self, host: &str) -> String {
        if self.uuid.is_empty() {
            log::warn!(
                "[Identity] Device at {} does not provide a UUID, duplicate detection may be unreliable",
                host
            );
            fallback_unique_id(host)
        } else {
            self.uuid.clone()
        }
    }

    /// Display name: the configured name, then the device's own, then a
    /// host-based default.
    pub fn display_name(&self, configured: Option<&str>, host: &str) -> String {
        match configured.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None if !self.name.is_empty() => self.name.clone(),
            None => format!("Linkplay Device ({})", host),
        }
    }
}

/// Builds the host-derived identifier used when no UUID is available.
pub fn fallback_unique_id(host: &str) -> String {
    format!("{}{}", FALLBACK_ID_PREFIX, host.replace('.', "_"))
}

/// Interprets a status response.
///
/// 400/401/403 mean the device is alive but will not hand out its status;
/// it is still accepted, with an empty identity.
pub(crate) fn identity_from_response(status: StatusCode, body: &str) -> ProbeResult<DeviceIdentity> {
    match status.as_u16() {
        200 => serde_json::from_str(body).map_err(|e| ProbeError::Parse(e.to_string())),
        400 | 401 | 403 => Ok(DeviceIdentity::default()),
        other => Err(ProbeError::Rejected(other)),
    }
}

/// Probes a device for its identity.
///
/// The client's configured timeout bounds the request.
pub async fn probe_device(
    client: &Client,
    protocol: Protocol,
    host: &str,
) -> ProbeResult<DeviceIdentity> {
    let url = build_command_url(protocol, host, STATUS_COMMAND)
        .map_err(|e| ProbeError::Unreachable(e.to_string()))?;

    let res = client
        .get(url)
        .send()
        .await
        .map_err(|e| ProbeError::Unreachable(format!("{}: {}", host, e)))?;

    let status = res.status();
    let body = res
        .text()
        .await
        .map_err(|e| ProbeError::Unreachable(format!("{}: {}", host, e)))?;

    if status != StatusCode::OK {
        log::warn!(
            "[Identity] Device at {} responded with status {}, UUID unavailable",
            host,
            status
        );
    }

    let identity = identity_from_response(status, &body)?;
    log::debug!("[Identity] Device info for {}: {:?}", host, identity);
    Ok(identity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_status_document() {
        let body = r#"{"uuid":"FF31F09E1A5020113B0A6F5C","DeviceName":"Kitchen","firmware":"4.6.415145"}"#;
        let identity = identity_from_response(StatusCode::OK, body).unwrap();
        assert_eq!(identity.uuid, "FF31F09E1A5020113B0A6F5C");
        assert_eq!(identity.name, "Kitchen");
    }

    #[test]
    fn auth_statuses_yield_empty_identity() {
        for code in [400u16, 401, 403] {
            let status = StatusCode::from_u16(code).unwrap();
            let identity = identity_from_response(status, "").unwrap();
            assert_eq!(identity, DeviceIdentity::default());
        }
    }

    #[test]
    fn other_statuses_are_rejected() {
        let err = identity_from_response(StatusCode::INTERNAL_SERVER_ERROR, "").unwrap_err();
        assert!(matches!(err, ProbeError::Rejected(500)));
        assert_eq!(err.code(), "device_rejected");
    }

    #[test]
    fn garbage_body_is_a_parse_error() {
        let err = identity_from_response(StatusCode::OK, "<html>").unwrap_err();
        assert!(matches!(err, ProbeError::Parse(_)));
    }

    #[test]
    fn unique_id_falls_back_to_host() {
        let identity = DeviceIdentity::default();
        assert_eq!(identity.unique_id("192.168.1.100"), "linkplay_192_168_1_100");

        let identity = DeviceIdentity {
            uuid: "abc".into(),
            name: String::new(),
        };
        assert_eq!(identity.unique_id("192.168.1.100"), "abc");
    }

    #[test]
    fn display_name_precedence() {
        let identity = DeviceIdentity {
            uuid: "abc".into(),
            name: "Den".into(),
        };
        assert_eq!(identity.display_name(Some("Office"), "10.0.0.2"), "Office");
        assert_eq!(identity.display_name(Some("  "), "10.0.0.2"), "Den");
        assert_eq!(
            DeviceIdentity::default().display_name(None, "10.0.0.2"),
            "Linkplay Device (10.0.0.2)"
        );
    }
}
