//! HTTP implementation of [`DeviceTransport`].
//!
//! Sends LinkPlay API commands as `GET {protocol}://{host}/httpapi.asp?command=...`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use super::traits::{DeviceError, DeviceResult, DeviceTransport};
use crate::protocol_constants::{API_TIMEOUT_SECS, HTTPAPI_PATH};

/// URL scheme used to reach a device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
    Https,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds the command URL for a device.
pub fn build_command_url(protocol: Protocol, host: &str, command: &str) -> DeviceResult<Url> {
    let base = format!("{}://{}{}", protocol, host, HTTPAPI_PATH);
    Url::parse_with_params(&base, &[("command", command)])
        .map_err(|e| DeviceError::Parse(format!("invalid device URL {}: {}", base, e)))
}

/// Response bodies LinkPlay firmware uses to refuse a command.
fn is_rejection(body: &str) -> bool {
    let trimmed = body.trim();
    trimmed.eq_ignore_ascii_case("unknown command") || trimmed.eq_ignore_ascii_case("failed")
}

/// LinkPlay HTTP API client shared by all device handles.
///
/// Devices serving HTTPS use self-signed certificates, so certificate
/// validation is disabled.
#[derive(Clone)]
pub struct HttpApiClient {
    client: Client,
    protocol: Protocol,
}

impl HttpApiClient {
    /// Creates a client with the default request timeout.
    pub fn new(protocol: Protocol) -> DeviceResult<Self> {
        Self::with_timeout(protocol, Duration::from_secs(API_TIMEOUT_SECS))
    }

    /// Creates a client with a custom request timeout.
    pub fn with_timeout(protocol: Protocol, timeout: Duration) -> DeviceResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(Self { client, protocol })
    }

    /// The underlying HTTP client (shared with the identity probe).
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }
}

#[async_trait]
impl DeviceTransport for HttpApiClient {
    async fn send(&self, host: &str, command: &str) -> DeviceResult<String> {
        let url = build_command_url(self.protocol, host, command)?;

        log::debug!("[HTTP-API] {} -> {}", command, host);

        let start = std::time::Instant::now();
        let res = self.client.get(url).send().await;
        log::debug!(
            "[HTTP-API] {} completed in {:?}: {:?}",
            command,
            start.elapsed(),
            res.as_ref().map(|r| r.status())
        );

        let res = res?;
        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(DeviceError::HttpStatus(status.as_u16(), body));
        }

        if is_rejection(&body) {
            return Err(DeviceError::Rejected(format!("{}: {}", command, body.trim())));
        }

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_url_encodes_command() {
        let url = build_command_url(Protocol::Http, "192.168.1.50", "setPlayerCmd:vol:40").unwrap();
        assert_eq!(url.scheme(), "http");
        assert_eq!(url.host_str(), Some("192.168.1.50"));
        assert_eq!(url.path(), "/httpapi.asp");

        let (key, value) = url.query_pairs().next().unwrap();
        assert_eq!(key, "command");
        assert_eq!(value, "setPlayerCmd:vol:40");
    }

    #[test]
    fn command_url_keeps_nested_urls_intact() {
        let url = build_command_url(
            Protocol::Https,
            "speaker.local",
            "setPlayerCmd:play:http://radio.example/stream?id=1&q=2",
        )
        .unwrap();
        assert_eq!(url.scheme(), "https");
        let pairs: Vec<_> = url.query_pairs().collect();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].1, "setPlayerCmd:play:http://radio.example/stream?id=1&q=2");
    }

    #[test]
    fn detects_rejection_bodies() {
        assert!(is_rejection("unknown command"));
        assert!(is_rejection(" Failed\n"));
        assert!(!is_rejection("OK"));
    }

    #[test]
    fn protocol_deserializes_lowercase() {
        let p: Protocol = serde_json::from_str("\"https\"").unwrap();
        assert_eq!(p, Protocol::Https);
        assert_eq!(Protocol::default().to_string(), "http");
    }
}
