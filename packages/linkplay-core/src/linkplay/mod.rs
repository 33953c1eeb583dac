//! LinkPlay device protocol.
//!
//! # Module Structure
//!
//! - `traits` - [`DeviceTransport`] abstraction and device error types
//! - `client` - `HttpApiClient`, the HTTP implementation of the transport
//! - `commands` - LinkPlay API command strings and status parsing
//! - `identity` - UUID/name lookup used when registering devices
//! - `retry` - Backoff for transient errors during group formation

pub mod client;
pub mod commands;
pub mod identity;
pub(crate) mod retry;
pub mod traits;

pub use client::{HttpApiClient, Protocol};
pub use identity::{probe_device, DeviceIdentity, ProbeError, ProbeResult};
pub use traits::{DeviceError, DeviceResult, DeviceTransport};
