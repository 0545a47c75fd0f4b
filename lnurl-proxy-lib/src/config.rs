//! Validated proxy configuration.

use crate::ConfigError;
use url::Url;

/// Default port of the issuer-facing RPC listener.
pub const DEFAULT_RPC_PORT: u16 = 10512;

/// Default host of the issuer-facing RPC listener.
pub const DEFAULT_RPC_HOST: &str = "0.0.0.0";

/// Default address of the wallet-facing HTTP listener.
pub const DEFAULT_HTTP_HOST: &str = "0.0.0.0:8012";

/// Settings for both proxy listeners.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Public base URL wallets reach the HTTP listener under, no trailing `/`.
    pub base_url: String,
    /// RPC listener host, a name or an IP literal.
    pub rpc_host: String,
    /// RPC listener port.
    pub rpc_port: u16,
    /// HTTP listener `host:port`.
    pub http_host: String,
}

impl ProxyConfig {
    /// Builds a configuration with default listeners for `base_url`.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            rpc_host: DEFAULT_RPC_HOST.to_string(),
            rpc_port: DEFAULT_RPC_PORT,
            http_host: DEFAULT_HTTP_HOST.to_string(),
        })
    }

    /// Overrides the RPC listener.
    pub fn with_rpc(mut self, host: impl Into<String>, port: u16) -> Self {
        self.rpc_host = host.into();
        self.rpc_port = port;
        self
    }

    /// Overrides the HTTP listener.
    pub fn with_http_host(mut self, http_host: impl Into<String>) -> Self {
        self.http_host = http_host.into();
        self
    }

    /// RPC listen address as `host:port`, ready for `TcpListener::bind`.
    ///
    /// Host names are left unresolved; binding looks them up.
    pub fn rpc_addr(&self) -> Result<String, ConfigError> {
        let host = self.rpc_host.trim();
        if host.is_empty() {
            return Err(ConfigError::InvalidAddress {
                field: "rpc host",
                reason: "host must not be empty".to_string(),
            });
        }
        // Bare IPv6 literals need brackets once a port is appended.
        if host.contains(':') && !host.starts_with('[') {
            Ok(format!("[{}]:{}", host, self.rpc_port))
        } else {
            Ok(format!("{}:{}", host, self.rpc_port))
        }
    }

    /// HTTP listen address as `host:port`.
    pub fn http_addr(&self) -> Result<String, ConfigError> {
        check_host_port("http host", self.http_host.trim())?;
        Ok(self.http_host.trim().to_string())
    }

    /// Checks every field, including the shape of the listen addresses.
    pub fn validate(&self) -> Result<(), ConfigError> {
        normalize_base_url(&self.base_url)?;
        self.rpc_addr()?;
        self.http_addr()?;
        Ok(())
    }
}

/// Validates a base URL and strips trailing slashes.
pub fn normalize_base_url(url: &str) -> Result<String, ConfigError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ConfigError::MissingBaseUrl);
    }

    let invalid = |reason: String| ConfigError::InvalidBaseUrl {
        url: url.to_string(),
        reason,
    };
    let parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme {}", other))),
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }
    if parsed.query().is_some() || parsed.fragment().is_some() {
        return Err(invalid("must not carry a query or fragment".to_string()));
    }

    Ok(url.trim_end_matches('/').to_string())
}

fn check_host_port(field: &'static str, addr: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidAddress {
        field,
        reason: format!("{}: {}", addr, reason),
    };
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| invalid("expected host:port"))?;
    if host.is_empty() {
        return Err(invalid("missing host"));
    }
    port.parse::<u16>().map_err(|_| invalid("invalid port"))?;
    Ok(())
}
