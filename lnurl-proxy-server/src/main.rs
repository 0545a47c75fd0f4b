//! LNURL Withdraw Proxy
//!
//! Bridges issuer withdraw streams to LNURL-withdraw wallet callbacks.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use lnurl_proxy_lib::config::{DEFAULT_HTTP_HOST, DEFAULT_RPC_HOST, DEFAULT_RPC_PORT};

mod commands;

#[derive(Parser)]
#[command(name = "lnurl-proxy")]
#[command(about = "LNURL withdraw proxy between issuer streams and wallet callbacks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true, env = "LNURLPROXY_VERBOSE")]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the proxy
    Serve(ServeArgs),

    /// Encode a URL as an LNURL
    Encode {
        /// URL to encode
        url: String,
    },

    /// Decode an LNURL back into its URL
    Decode {
        /// LNURL, optionally prefixed with `lightning:`
        lnurl: String,
    },

    /// Open a withdraw offer against a running proxy (issuer side)
    Open {
        /// Proxy issuer listener address
        #[arg(long, default_value = "127.0.0.1:10512")]
        proxy: String,

        /// Withdraw id
        id: String,

        /// Minimum withdrawable amount (msat)
        #[arg(long, default_value_t = 1000)]
        min: i64,

        /// Maximum withdrawable amount (msat)
        #[arg(long, default_value_t = 100_000)]
        max: i64,

        /// Default invoice description
        #[arg(long, default_value = "")]
        description: String,

        /// Report the invoice as failed with this reason instead of paid
        #[arg(long)]
        reject: Option<String>,
    },
}

#[derive(Args)]
struct ServeArgs {
    /// Port of the issuer stream listener
    #[arg(long, env = "LNURLPROXY_RPC_PORT", default_value_t = DEFAULT_RPC_PORT)]
    rpc_port: u16,

    /// Host of the issuer stream listener
    #[arg(long, env = "LNURLPROXY_RPC_HOST", default_value = DEFAULT_RPC_HOST)]
    rpc_host: String,

    /// Address of the wallet HTTP listener
    #[arg(long, env = "LNURLPROXY_HTTP_HOST", default_value = DEFAULT_HTTP_HOST)]
    http_host: String,

    /// Public base URL wallets reach the HTTP listener under
    #[arg(long, env = "LNURLPROXY_BASE_URL")]
    base_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("lnurl_proxy=debug,lnurl_proxy_server=debug,lnurl_proxy_lib=debug,lnurl_proxy_interactive=debug")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("lnurl_proxy=info,lnurl_proxy_server=info,lnurl_proxy_lib=warn,lnurl_proxy_interactive=info")
            .init();
    }

    match cli.command {
        Commands::Serve(args) => {
            commands::serve::run(
                args.base_url.as_deref().unwrap_or_default(),
                &args.rpc_host,
                args.rpc_port,
                &args.http_host,
            )
            .await?;
        }
        Commands::Encode { url } => {
            commands::codec::encode(&url)?;
        }
        Commands::Decode { lnurl } => {
            commands::codec::decode(&lnurl)?;
        }
        Commands::Open {
            proxy,
            id,
            min,
            max,
            description,
            reject,
        } => {
            commands::open::run(&proxy, &id, min, max, description, reject).await?;
        }
    }

    Ok(())
}
