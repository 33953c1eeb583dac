//! Per-device volume offsets.
//!
//! Callers may express an offset as whole percentage points (`-10`) or as a
//! fraction (`-0.1`). Both shapes collapse to a fraction before any
//! arithmetic; a JSON integer is a percentage, a JSON number with a
//! fractional part (including `1.0`) is a fraction.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::OffsetRangeError;
use crate::protocol_constants::{
    OFFSET_FRACTION_MAX, OFFSET_FRACTION_MIN, OFFSET_PERCENT_MAX, OFFSET_PERCENT_MIN,
};

/// Offset as supplied by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OffsetValue {
    /// Whole percentage points, `[-100, 100]`.
    Percent(i64),
    /// Fraction of full scale, `[-1.0, 1.0]`.
    Fraction(f64),
}

impl OffsetValue {
    /// Normalizes to a fraction, validating the range for this shape.
    pub fn normalize(self, device_id: &str) -> Result<f64, OffsetRangeError> {
        match self {
            Self::Percent(value) => {
                if !(OFFSET_PERCENT_MIN..=OFFSET_PERCENT_MAX).contains(&value) {
                    return Err(OffsetRangeError::Percent {
                        device_id: device_id.to_string(),
                        value,
                    });
                }
                Ok(value as f64 / 100.0)
            }
            Self::Fraction(value) => {
                // NaN fails the range check as well
                if !(OFFSET_FRACTION_MIN..=OFFSET_FRACTION_MAX).contains(&value) {
                    return Err(OffsetRangeError::Fraction {
                        device_id: device_id.to_string(),
                        value,
                    });
                }
                Ok(value)
            }
        }
    }
}

/// Offsets keyed by device id, as received.
pub type RawOffsets = BTreeMap<String, OffsetValue>;

/// Offsets keyed by device id, normalized to fractions.
pub type Offsets = BTreeMap<String, f64>;

/// Normalizes every entry, failing on the first out-of-range value.
///
/// Runs to completion before any device is touched, so a single bad entry
/// leaves every device unchanged.
pub fn normalize_offsets(raw: &RawOffsets) -> Result<Offsets, OffsetRangeError> {
    raw.iter()
        .map(|(device_id, value)| Ok((device_id.clone(), value.normalize(device_id)?)))
        .collect()
}

/// Volume for a follower given the group target and its offset.
#[must_use]
pub fn apply_offset(target: f64, offset: f64) -> f64 {
    (target + offset).clamp(0.0, 1.0)
}
