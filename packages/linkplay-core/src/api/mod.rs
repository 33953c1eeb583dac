//! HTTP API layer.
//!
//! Thin handlers over the dispatcher and registry, plus router construction
//! and server startup.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;

use crate::device::DeviceRegistry;
use crate::services::Dispatcher;

pub mod http;
pub mod response;

/// Errors that can occur when starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to a TCP port.
    #[error("Failed to bind to port: {0}")]
    Bind(#[from] std::io::Error),
}

/// Shared application state for the API layer.
#[derive(Clone)]
pub struct AppState {
    /// Entry point for every operation.
    pub dispatcher: Arc<Dispatcher>,
    /// Registered devices, for read-only views.
    pub registry: Arc<DeviceRegistry>,
}

impl AppState {
    pub fn new(dispatcher: Arc<Dispatcher>, registry: Arc<DeviceRegistry>) -> Self {
        Self {
            dispatcher,
            registry,
        }
    }
}

/// Serves the API on `port` until `shutdown` resolves.
pub async fn start_server<F>(state: AppState, port: u16, shutdown: F) -> Result<(), ServerError>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    log::info!("Server listening on http://{}", listener.local_addr()?);
    let app = http::create_router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
