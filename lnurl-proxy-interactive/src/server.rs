//! Issuer listener.
//!
//! Accepts issuer connections and runs one [`WithdrawSession`] per
//! connection until [`WithdrawProxyServer::stop`] is called.

use crate::metrics::Metrics;
use crate::session::{SessionError, SessionState, WithdrawSession};
use crate::transport::{FramedStream, ServerStream};
use crate::{Result, WithdrawResponse, WithdrawStream};
use lnurl_proxy_lib::OfferRegistry;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Serves withdraw streams on top of a shared [`OfferRegistry`].
#[derive(Clone)]
pub struct WithdrawProxyServer {
    registry: OfferRegistry,
    shutdown: CancellationToken,
    metrics: Arc<Metrics>,
}

impl WithdrawProxyServer {
    pub fn new(registry: OfferRegistry) -> Self {
        Self::with_shutdown(registry, CancellationToken::new())
    }

    /// Use an externally owned shutdown token.
    pub fn with_shutdown(registry: OfferRegistry, shutdown: CancellationToken) -> Self {
        Self {
            registry,
            shutdown,
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn registry(&self) -> &OfferRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Cancel every pending session and stop accepting connections.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Handle one issuer stream from `open` to its terminal state.
    pub async fn lnurl_withdraw<S>(
        &self,
        stream: &mut S,
    ) -> std::result::Result<SessionState, SessionError>
    where
        S: WithdrawStream + ?Sized,
    {
        self.metrics.record_session_opened();
        let session = WithdrawSession::new(
            self.registry.clone(),
            self.shutdown.child_token(),
            Arc::clone(&self.metrics),
        );
        let result = session.run(stream).await;
        self.metrics.record_session_closed();
        result
    }

    /// Accept issuer connections until stopped, then wait for the running
    /// sessions to wind down.
    #[tracing::instrument(skip_all, fields(addr = ?listener.local_addr().ok()))]
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let mut connections = JoinSet::new();
        tracing::info!("withdraw stream listener started");

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((socket, peer)) => {
                        let server = self.clone();
                        connections.spawn(async move { server.handle_connection(socket, peer).await });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to accept issuer connection");
                    }
                },
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!(error = %e, "issuer connection task failed");
                    }
                }
            }
        }

        while connections.join_next().await.is_some() {}
        tracing::info!("withdraw stream listener stopped");
        Ok(())
    }

    async fn handle_connection(&self, socket: TcpStream, peer: SocketAddr) {
        if let Err(e) = socket.set_nodelay(true) {
            tracing::debug!(%peer, error = %e, "failed to set TCP_NODELAY");
        }
        tracing::debug!(%peer, "issuer connected");

        let mut stream: ServerStream<TcpStream> = FramedStream::new(socket);
        match self.lnurl_withdraw(&mut stream).await {
            Ok(state) => {
                tracing::debug!(%peer, %state, "withdraw session finished");
                let _ = stream.close().await;
            }
            Err(e) => {
                tracing::warn!(%peer, code = %e.code(), error = %e, "withdraw session failed");
                let status = WithdrawResponse::Status {
                    code: e.code(),
                    message: e.to_string(),
                };
                if let Err(send_err) = stream.send(status).await {
                    tracing::debug!(%peer, error = %send_err, "could not report status to issuer");
                }
                let _ = stream.close().await;
            }
        }
    }
}
