//! Centralized error types for the LinkPlay core library.
//!
//! This module provides a unified error handling system that:
//! - Defines structured error types using `thiserror`
//! - Maps errors to appropriate HTTP status codes
//! - Implements `IntoResponse` for automatic JSON error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::linkplay::{DeviceError, ProbeError};

/// A volume offset outside the range allowed for its shape.
///
/// Raised while normalizing a group volume request, before any device is
/// touched.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum OffsetRangeError {
    /// Whole-percent offset outside `[-100, 100]`.
    #[error("invalid offset {value} for {device_id}: expected value between -100 and 100")]
    Percent { device_id: String, value: i64 },

    /// Fractional offset outside `[-1.0, 1.0]`.
    #[error("invalid offset {value} for {device_id}: expected value between -1.0 and 1.0")]
    Fraction { device_id: String, value: f64 },
}

impl OffsetRangeError {
    /// The device the offending offset was addressed to.
    pub fn device_id(&self) -> &str {
        match self {
            Self::Percent { device_id, .. } | Self::Fraction { device_id, .. } => device_id,
        }
    }
}

/// One failed device call inside a best-effort batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceFailure {
    pub device_id: String,
    pub message: String,
}

impl DeviceFailure {
    pub fn new(device_id: &str, err: &impl std::fmt::Display) -> Self {
        Self {
            device_id: device_id.to_string(),
            message: err.to_string(),
        }
    }
}

fn format_failures(failures: &[DeviceFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.device_id, f.message))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Application-wide error type.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum LinkPlayError {
    /// A volume offset failed validation; nothing was applied.
    #[error(transparent)]
    OffsetRange(#[from] OffsetRangeError),

    /// Client sent an invalid or malformed request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Operation name is not one the dispatcher knows.
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// Device id is not registered.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// A single device call failed.
    #[error("Device call failed: {0}")]
    Device(String),

    /// One or more device calls in a batch failed. Siblings still ran.
    #[error("{} device call(s) failed: {}", .0.len(), format_failures(.0))]
    DeviceCalls(Vec<DeviceFailure>),

    /// Device identity could not be established.
    #[error("Device probe failed: {0}")]
    Probe(String),

    /// Server configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl LinkPlayError {
    /// Returns a machine-readable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::OffsetRange(_) => "offset_out_of_range",
            Self::InvalidRequest(_) => "invalid_request",
            Self::UnknownOperation(_) => "unknown_operation",
            Self::DeviceNotFound(_) => "device_not_found",
            Self::Device(_) => "device_error",
            Self::DeviceCalls(_) => "device_calls_failed",
            Self::Probe(_) => "probe_failed",
            Self::Configuration(_) => "configuration_error",
        }
    }

    /// Maps the error to an appropriate HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::OffsetRange(_) | Self::InvalidRequest(_) | Self::UnknownOperation(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::DeviceNotFound(_) => StatusCode::NOT_FOUND,
            Self::Device(_) | Self::DeviceCalls(_) | Self::Probe(_) => StatusCode::BAD_GATEWAY,
            Self::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Builds the result of a best-effort batch: `Ok` when nothing failed.
    pub fn from_failures(failures: Vec<DeviceFailure>) -> LinkPlayResult<()> {
        if failures.is_empty() {
            Ok(())
        } else {
            Err(Self::DeviceCalls(failures))
        }
    }
}

/// Convenient Result alias for application-wide operations.
pub type LinkPlayResult<T> = Result<T, LinkPlayError>;

/// JSON response body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

impl IntoResponse for LinkPlayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<DeviceError> for LinkPlayError {
    fn from(err: DeviceError) -> Self {
        Self::Device(err.to_string())
    }
}

impl From<ProbeError> for LinkPlayError {
    fn from(err: ProbeError) -> Self {
        Self::Probe(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_errors_name_device_and_value() {
        let err = OffsetRangeError::Percent {
            device_id: "kitchen".into(),
            value: 150,
        };
        let msg = err.to_string();
        assert!(msg.contains("kitchen"));
        assert!(msg.contains("150"));
        assert!(msg.contains("expected value between -100 and 100"));

        let err = OffsetRangeError::Fraction {
            device_id: "bedroom".into(),
            value: -1.5,
        };
        assert!(err.to_string().contains("expected value between -1.0 and 1.0"));
        assert_eq!(err.device_id(), "bedroom");
    }

    #[test]
    fn offset_error_is_a_bad_request() {
        let err = LinkPlayError::from(OffsetRangeError::Percent {
            device_id: "kitchen".into(),
            value: -200,
        });
        assert_eq!(err.code(), "offset_out_of_range");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn batch_failures_are_listed() {
        assert!(LinkPlayError::from_failures(vec![]).is_ok());

        let err = LinkPlayError::from_failures(vec![
            DeviceFailure::new("kitchen", &"timeout"),
            DeviceFailure::new("bedroom", &"command rejected"),
        ])
        .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            err.to_string(),
            "2 device call(s) failed: kitchen (timeout), bedroom (command rejected)"
        );
    }

    #[test]
    fn device_not_found_maps_to_404() {
        let err = LinkPlayError::DeviceNotFound("garage".into());
        assert_eq!(err.code(), "device_not_found");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
