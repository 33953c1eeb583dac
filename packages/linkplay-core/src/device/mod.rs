//! Device handles, the registry holding them, and offset normalization.

pub mod handle;
pub mod offset;
pub mod registry;

pub use handle::{DeviceHandle, DeviceStatus, GroupRole};
pub use offset::{normalize_offsets, OffsetValue, Offsets, RawOffsets};
pub use registry::{DeviceRegistry, Selection, ALL_DEVICES};
