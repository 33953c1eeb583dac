//! Fixed protocol constants that should NOT be changed.
//!
//! These values are defined by the LinkPlay HTTP API and by the offset
//! conventions callers rely on.

// ─────────────────────────────────────────────────────────────────────────────
// HTTP API
// ─────────────────────────────────────────────────────────────────────────────

/// Path of the LinkPlay command endpoint on every device.
pub const HTTPAPI_PATH: &str = "/httpapi.asp";

/// Timeout for a single device request (seconds).
///
/// Matches the identity lookup timeout used during device setup.
pub const API_TIMEOUT_SECS: u64 = 5;

/// Status command used to learn a device's identity.
pub const STATUS_COMMAND: &str = "getStatus";

/// Prefix for the fallback unique id of devices that do not report a UUID.
pub const FALLBACK_ID_PREFIX: &str = "linkplay_";

// ─────────────────────────────────────────────────────────────────────────────
// Volume
// ─────────────────────────────────────────────────────────────────────────────

/// Device volume scale used on the wire (0-100).
pub const DEVICE_VOLUME_MAX: u8 = 100;

/// Bounds for offsets given as whole percentage points.
pub const OFFSET_PERCENT_MIN: i64 = -100;
pub const OFFSET_PERCENT_MAX: i64 = 100;

/// Bounds for offsets given as fractions.
pub const OFFSET_FRACTION_MIN: f64 = -1.0;
pub const OFFSET_FRACTION_MAX: f64 = 1.0;

/// Default step for volume up/down operations (percent).
pub const DEFAULT_VOLUME_STEP: u8 = 5;

// ─────────────────────────────────────────────────────────────────────────────
// Service
// ─────────────────────────────────────────────────────────────────────────────

/// Service identifier reported by the health endpoint.
pub const SERVICE_ID: &str = "linkplay-server";
