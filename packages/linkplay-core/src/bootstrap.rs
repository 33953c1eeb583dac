//! Application bootstrap and dependency wiring.
//!
//! This is the composition root: the HTTP transports, the device registry
//! and the dispatcher are created here, and the configured devices are
//! probed and registered before the API starts serving.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::device::{DeviceHandle, DeviceRegistry};
use crate::error::{LinkPlayError, LinkPlayResult};
use crate::linkplay::{probe_device, DeviceIdentity, DeviceTransport, HttpApiClient, Protocol};
use crate::services::Dispatcher;
use crate::state::Config;

/// A device the server should manage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// IP address or hostname.
    pub host: String,
    /// Overrides the name the device reports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub protocol: Protocol,
}

impl DeviceConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            name: None,
            protocol: Protocol::default(),
        }
    }
}

/// Container for all bootstrapped services.
#[derive(Clone)]
pub struct BootstrappedServices {
    /// All registered devices.
    pub registry: Arc<DeviceRegistry>,
    /// Entry point for every operation.
    pub dispatcher: Arc<Dispatcher>,
    http: Arc<HttpApiClient>,
    https: Arc<HttpApiClient>,
    volume_step: u8,
}

impl BootstrappedServices {
    fn client_for(&self, protocol: Protocol) -> &Arc<HttpApiClient> {
        match protocol {
            Protocol::Http => &self.http,
            Protocol::Https => &self.https,
        }
    }

    /// Probes a device and registers it.
    ///
    /// Returns the id the device was registered under. An unreachable device
    /// is not registered.
    pub async fn register_device(&self, device: &DeviceConfig) -> LinkPlayResult<String> {
        let client = self.client_for(device.protocol);
        let identity = probe_device(client.http_client(), device.protocol, &device.host).await?;

        let handle = build_handle(
            &identity,
            device,
            Arc::clone(client) as Arc<dyn DeviceTransport>,
            self.volume_step,
        );
        let id = handle.id().to_string();
        self.registry.register(Arc::new(handle));
        Ok(id)
    }

    /// Clears the registry. Device state is not touched.
    pub fn shutdown(&self) {
        log::info!("[Bootstrap] Beginning shutdown...");
        self.registry.clear();
        log::info!("[Bootstrap] Shutdown complete");
    }
}

/// Builds a handle from a probed identity and its configuration entry.
pub(crate) fn build_handle(
    identity: &DeviceIdentity,
    device: &DeviceConfig,
    transport: Arc<dyn DeviceTransport>,
    volume_step: u8,
) -> DeviceHandle {
    DeviceHandle::new(
        identity.unique_id(&device.host),
        identity.display_name(device.name.as_deref(), &device.host),
        device.host.clone(),
        transport,
        volume_step,
    )
}

/// Creates the services and registers the configured devices.
///
/// Devices that cannot be probed are skipped with a warning; the rest of the
/// system starts regardless.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or an HTTP client
/// cannot be built.
pub async fn bootstrap_services(
    config: &Config,
    devices: &[DeviceConfig],
) -> LinkPlayResult<BootstrappedServices> {
    config.validate().map_err(LinkPlayError::Configuration)?;

    let timeout = Duration::from_secs(config.api_timeout_secs);
    let http = Arc::new(HttpApiClient::with_timeout(Protocol::Http, timeout)?);
    let https = Arc::new(HttpApiClient::with_timeout(Protocol::Https, timeout)?);

    let registry = Arc::new(DeviceRegistry::new());
    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&registry), config));

    let services = BootstrappedServices {
        registry,
        dispatcher,
        http,
        https,
        volume_step: config.volume_step,
    };

    for device in devices {
        match services.register_device(device).await {
            Ok(id) => log::debug!("[Bootstrap] {} registered as {}", device.host, id),
            Err(e) => log::warn!("[Bootstrap] Skipping {}: {}", device.host, e),
        }
    }

    log::info!(
        "[Bootstrap] {} of {} device(s) registered",
        services.registry.len(),
        devices.len()
    );
    Ok(services)
}
