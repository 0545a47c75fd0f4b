//! LNURL withdraw proxy server.
//!
//! Runs the issuer stream listener and the wallet HTTP callbacks side by side
//! on one shared [`OfferRegistry`].

pub mod http;

use anyhow::{Context, Result};
use lnurl_proxy_interactive::{Metrics, WithdrawProxyServer};
use lnurl_proxy_lib::{OfferRegistry, ProxyConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use http::{build_router, serve_http, AppState};

/// Both listeners of a started proxy.
pub struct RunningProxy {
    pub rpc_addr: SocketAddr,
    pub http_addr: SocketAddr,
    registry: OfferRegistry,
    metrics: Arc<Metrics>,
    shutdown: CancellationToken,
    rpc: JoinHandle<lnurl_proxy_interactive::Result<()>>,
    http: JoinHandle<std::io::Result<()>>,
}

impl RunningProxy {
    /// Bind both listeners and start serving.
    ///
    /// Cancelling `shutdown` cancels pending offers and stops both listeners.
    pub async fn start(config: &ProxyConfig, shutdown: CancellationToken) -> Result<Self> {
        config.validate()?;

        let registry = OfferRegistry::new(config.base_url.as_str());
        let server = WithdrawProxyServer::with_shutdown(registry.clone(), shutdown.clone());
        let metrics = server.metrics();

        let rpc_listener = TcpListener::bind(config.rpc_addr()?)
            .await
            .with_context(|| {
                format!(
                    "Failed to bind rpc listener on {}:{}",
                    config.rpc_host, config.rpc_port
                )
            })?;
        let http_listener = TcpListener::bind(config.http_addr()?)
            .await
            .with_context(|| format!("Failed to bind http listener on {}", config.http_host))?;
        let rpc_addr = rpc_listener.local_addr()?;
        let http_addr = http_listener.local_addr()?;

        let rpc = tokio::spawn(async move { server.serve(rpc_listener).await });
        let http = tokio::spawn(serve_http(
            http_listener,
            AppState::new(registry.clone(), Arc::clone(&metrics)),
            shutdown.clone(),
        ));

        tracing::info!(%rpc_addr, %http_addr, base_url = %config.base_url, "lnurl proxy started");

        Ok(Self {
            rpc_addr,
            http_addr,
            registry,
            metrics,
            shutdown,
            rpc,
            http,
        })
    }

    pub fn registry(&self) -> &OfferRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Trigger shutdown without waiting for it.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Wait until both listeners have stopped.
    pub async fn wait(self) -> Result<()> {
        let (rpc, http) = tokio::join!(self.rpc, self.http);
        rpc.context("rpc listener task panicked")??;
        http.context("http listener task panicked")??;
        tracing::info!(metrics = %self.metrics.snapshot().to_json(), "lnurl proxy stopped");
        Ok(())
    }
}
