//! Serve command - run both proxy listeners until interrupted

use anyhow::Result;
use lnurl_proxy_lib::ProxyConfig;
use lnurl_proxy_server::RunningProxy;
use tokio_util::sync::CancellationToken;

#[tracing::instrument(skip_all)]
pub async fn run(base_url: &str, rpc_host: &str, rpc_port: u16, http_host: &str) -> Result<()> {
    let config = ProxyConfig::new(base_url)?
        .with_rpc(rpc_host, rpc_port)
        .with_http_host(http_host);

    let shutdown = CancellationToken::new();
    let proxy = RunningProxy::start(&config, shutdown.clone()).await?;

    println!("Issuer streams on {}", proxy.rpc_addr);
    println!("Wallet callbacks on {} ({})", proxy.http_addr, config.base_url);

    shutdown_signal().await;
    tracing::info!("shutdown requested, canceling pending withdraws");
    shutdown.cancel();

    proxy.wait().await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
