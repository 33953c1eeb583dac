//! Application services layer.
//!
//! Group coordination and the command dispatcher that sits in front of it.
//! Both read the device registry; neither registers devices.

pub mod dispatcher;
pub mod group_coordinator;

pub use dispatcher::{Dispatcher, Operation, OperationKind};
pub use group_coordinator::{GroupCoordinator, MixedUnjoinPolicy};
