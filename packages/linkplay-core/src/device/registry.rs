//! Registry of known devices.
//!
//! Populated at startup, cleared at shutdown. The group coordinator and the
//! dispatcher only read it; registration happens through [`DeviceRegistry::register`]
//! during bootstrap.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::Deserialize;

use super::handle::{DeviceHandle, DeviceStatus};

/// Sentinel selecting every registered device.
pub const ALL_DEVICES: &str = "all";

/// Devices addressed by an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    Ids(Vec<String>),
}

impl Selection {
    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Ids(ids.into_iter().map(Into::into).collect())
    }

    pub fn one(id: impl Into<String>) -> Self {
        Self::Ids(vec![id.into()])
    }

    fn from_str_value(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case(ALL_DEVICES) {
            return Self::All;
        }
        Self::Ids(
            value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }
}

/// Accepts `"all"`, a single id (or comma-separated ids), or a list of ids.
impl<'de> Deserialize<'de> for Selection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SelectionVisitor;

        impl<'de> Visitor<'de> for SelectionVisitor {
            type Value = Selection;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("\"all\", a device id, or a list of device ids")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Selection, E> {
                Ok(Selection::from_str_value(value))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Selection, A::Error> {
                let mut ids = Vec::new();
                while let Some(id) = seq.next_element::<String>()? {
                    if id.eq_ignore_ascii_case(ALL_DEVICES) {
                        return Err(de::Error::custom(
                            "\"all\" cannot be combined with device ids",
                        ));
                    }
                    ids.push(id);
                }
                Ok(Selection::Ids(ids))
            }
        }

        deserializer.deserialize_any(SelectionVisitor)
    }
}

/// Process-wide collection of device handles, in registration order.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: RwLock<Vec<Arc<DeviceHandle>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a device. A device already registered under the same id is
    /// replaced in place, keeping its position.
    pub fn register(&self, device: Arc<DeviceHandle>) {
        let mut devices = self.devices.write();
        if let Some(slot) = devices.iter_mut().find(|d| d.id() == device.id()) {
            log::info!("[Registry] Replacing device {}", device.id());
            *slot = device;
        } else {
            log::info!(
                "[Registry] Registered {} ({}) at {}",
                device.id(),
                device.name(),
                device.host()
            );
            devices.push(device);
        }
    }

    /// Removes a device, returning it if it was registered.
    pub fn deregister(&self, id: &str) -> Option<Arc<DeviceHandle>> {
        let mut devices = self.devices.write();
        let pos = devices.iter().position(|d| d.id() == id)?;
        log::info!("[Registry] Deregistered {}", id);
        Some(devices.remove(pos))
    }

    /// Removes every device.
    pub fn clear(&self) {
        let mut devices = self.devices.write();
        if !devices.is_empty() {
            log::info!("[Registry] Clearing {} device(s)", devices.len());
        }
        devices.clear();
    }

    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.devices.read().iter().map(|d| d.id().to_string()).collect()
    }

    pub fn all(&self) -> Vec<Arc<DeviceHandle>> {
        self.devices.read().clone()
    }

    pub fn find_one(&self, id: &str) -> Option<Arc<DeviceHandle>> {
        self.devices.read().iter().find(|d| d.id() == id).cloned()
    }

    /// Resolves a selection to handles.
    ///
    /// `All` yields registration order; explicit ids yield encounter order
    /// with duplicates collapsed. Unknown ids are dropped.
    pub fn resolve(&self, selection: &Selection) -> Vec<Arc<DeviceHandle>> {
        match selection {
            Selection::All => self.all(),
            Selection::Ids(ids) => {
                let devices = self.devices.read();
                let mut resolved: Vec<Arc<DeviceHandle>> = Vec::with_capacity(ids.len());
                for id in ids {
                    if resolved.iter().any(|d| d.id() == id) {
                        continue;
                    }
                    match devices.iter().find(|d| d.id() == id) {
                        Some(device) => resolved.push(Arc::clone(device)),
                        None => log::debug!("[Registry] Ignoring unknown device {}", id),
                    }
                }
                resolved
            }
        }
    }

    /// Status of every device, in registration order.
    pub fn snapshot(&self) -> Vec<DeviceStatus> {
        self.devices.read().iter().map(|d| d.status()).collect()
    }
}
