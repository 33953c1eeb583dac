//! LinkPlay Core - multiroom group coordination for LinkPlay speakers.
//!
//! This crate keeps a registry of LinkPlay devices, groups them into
//! multiroom groups under a leader, and distributes a single group volume
//! across the members with per-device offsets. It is used by the headless
//! `linkplay-server` binary.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`linkplay`]: LinkPlay HTTP API transport, command strings, identity probe
//! - [`device`]: Device handles, the device registry, offset normalization
//! - [`services`]: Group coordinator and command dispatcher
//! - [`api`]: HTTP API over the dispatcher
//! - [`bootstrap`]: Composition root wiring everything together
//! - [`state`]: Core configuration
//! - [`error`]: Centralized error types
//!
//! # Abstraction Traits
//!
//! Device handles talk to hardware through
//! [`DeviceTransport`](linkplay::DeviceTransport). [`HttpApiClient`] is the
//! production implementation; tests substitute recording mocks.

#![warn(clippy::all)]

pub mod api;
pub mod bootstrap;
pub mod device;
pub mod error;
pub mod linkplay;
pub mod protocol_constants;
pub mod services;
pub mod state;

// Re-export commonly used types at the crate root
pub use error::{DeviceFailure, LinkPlayError, LinkPlayResult, OffsetRangeError};
pub use state::Config;

// Re-export device types
pub use device::{
    DeviceHandle, DeviceRegistry, DeviceStatus, GroupRole, OffsetValue, RawOffsets, Selection,
};

// Re-export transport types
pub use linkplay::{
    probe_device, DeviceError, DeviceIdentity, DeviceResult, DeviceTransport, HttpApiClient,
    ProbeError, Protocol,
};

// Re-export service types
pub use services::{Dispatcher, GroupCoordinator, MixedUnjoinPolicy, Operation, OperationKind};

// Re-export bootstrap types
pub use bootstrap::{bootstrap_services, BootstrappedServices, DeviceConfig};

// Re-export API types
pub use api::{start_server, AppState, ServerError};
