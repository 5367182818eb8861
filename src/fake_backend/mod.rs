//! In-memory stand-in for the inventory REST API, served with warp.
//!
//! Tests start one per case on an ephemeral port and turn the knobs on
//! [`BackendState`] to script refresh delays, failures and rejections.

mod error;
mod handler;
mod router;
mod state;

pub use error::{BackendError, ErrorBody, recover_error};
pub use router::routes;
pub use state::*;

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;
use warp::Filter;

pub struct FakeBackend {
    state: Arc<BackendState>,
    addr: SocketAddr,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl FakeBackend {
    /// Binds `addr` (port 0 picks a free one) and serves on the current runtime.
    pub fn start(addr: SocketAddr, config: FakeBackendConfig) -> Result<Self, warp::Error> {
        let state = Arc::new(BackendState::new(config));
        let cancel = CancellationToken::new();

        let api = routes(state.clone()).recover(recover_error);
        let shutdown = cancel.clone();
        let (addr, server) = warp::serve(api)
            .try_bind_with_graceful_shutdown(addr, async move { shutdown.cancelled().await })?;
        let handle = tokio::spawn(server);
        info!(%addr, "fake backend listening");

        Ok(Self {
            state,
            addr,
            cancel,
            handle: Some(handle),
        })
    }

    /// Starts on `127.0.0.1` with a free port.
    pub fn start_local(config: FakeBackendConfig) -> Result<Self, warp::Error> {
        Self::start(SocketAddr::from(([127, 0, 0, 1], 0)), config)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL including the `/api` prefix, ready for the gateway config.
    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn state(&self) -> &Arc<BackendState> {
        &self.state
    }

    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let r = handle.await;
            info!("fake backend stopped: {:?}", r);
        }
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
