//! LNURL Withdraw Proxy Interactive Layer
//!
//! Issuer-facing side of the proxy. An issuer opens a stream, announces a
//! withdraw offer and then blocks until a wallet submits an invoice for it
//! through the HTTP callbacks. This crate defines the messages exchanged on
//! that stream, the session state machine that drives one stream, a framed
//! TCP transport, and the accept loop.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

pub mod client;
pub mod metrics;
pub mod server;
pub mod session;
pub mod transport;

pub use client::WithdrawClient;
pub use metrics::{Metrics, MetricsSnapshot};
pub use server::WithdrawProxyServer;
pub use session::{SessionError, SessionState, WithdrawSession};
pub use transport::{ClientStream, FramedStream, ServerStream, MAX_FRAME_SIZE};

/// `status` value of a successful [`WithdrawRequest::Pay`].
pub const PAY_STATUS_OK: &str = "OK";

/// `status` value of a failed [`WithdrawRequest::Pay`].
pub const PAY_STATUS_ERROR: &str = "ERROR";

/// Messages sent by the issuer to the proxy.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum WithdrawRequest {
    /// First message of every stream: the offer to publish.
    Open {
        withdraw_id: String,
        min_amount: i64,
        max_amount: i64,
        #[serde(default)]
        description: String,
    },
    /// Result of paying the invoice the proxy forwarded.
    Pay {
        status: String,
        #[serde(default)]
        reason: String,
    },
}

impl WithdrawRequest {
    /// Short name of the variant, for errors and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            WithdrawRequest::Open { .. } => "open",
            WithdrawRequest::Pay { .. } => "pay",
        }
    }

    /// A successful payment result.
    pub fn paid() -> Self {
        WithdrawRequest::Pay {
            status: PAY_STATUS_OK.to_string(),
            reason: String::new(),
        }
    }

    /// A failed payment result.
    pub fn payment_failed(reason: impl Into<String>) -> Self {
        WithdrawRequest::Pay {
            status: PAY_STATUS_ERROR.to_string(),
            reason: reason.into(),
        }
    }
}

/// Messages sent by the proxy to the issuer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum WithdrawResponse {
    /// The LNURL under which the offer is published.
    BechString { bech_string: String },
    /// The invoice a wallet submitted for the offer.
    Invoice { invoice: String },
    /// Final frame when the session ends with an error.
    Status { code: StatusCode, message: String },
}

impl WithdrawResponse {
    /// Short name of the variant, for errors and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            WithdrawResponse::BechString { .. } => "bech_string",
            WithdrawResponse::Invoice { .. } => "invoice",
            WithdrawResponse::Status { .. } => "status",
        }
    }
}

/// Error codes reported to the issuer in a [`WithdrawResponse::Status`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    /// Transport, protocol or payment failure.
    Unknown,
    /// The server shut down while the session was waiting.
    Canceled,
    /// The `open` message carried an empty withdraw id.
    InvalidArgument,
    /// Another session already owns the withdraw id.
    AlreadyExists,
    /// The offer could not be published.
    Internal,
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StatusCode::Unknown => "unknown",
            StatusCode::Canceled => "canceled",
            StatusCode::InvalidArgument => "invalid argument",
            StatusCode::AlreadyExists => "already exists",
            StatusCode::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// A bidirectional issuer stream as seen by the proxy.
///
/// Implemented by [`ServerStream`] over TCP; tests use in-memory doubles.
#[async_trait::async_trait]
pub trait WithdrawStream: Send {
    /// Send a message to the issuer.
    async fn send(&mut self, msg: WithdrawResponse) -> Result<()>;
    /// Receive the next message from the issuer.
    async fn recv(&mut self) -> Result<WithdrawRequest>;
    /// Token cancelled once the issuer has gone away.
    fn disconnected(&self) -> CancellationToken;
}

/// Result type for interactive operations.
pub type Result<T> = std::result::Result<T, InteractiveError>;

/// Errors raised on an issuer stream.
#[derive(thiserror::Error, Debug)]
pub enum InteractiveError {
    /// Connection or I/O failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// Oversized frame or a message that breaks the protocol.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// A frame that is not valid JSON for the expected message.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// The proxy ended the session with a status frame.
    #[error("proxy returned {code}: {message}")]
    Status { code: StatusCode, message: String },
}

impl From<serde_json::Error> for InteractiveError {
    fn from(e: serde_json::Error) -> Self {
        InteractiveError::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for InteractiveError {
    fn from(e: std::io::Error) -> Self {
        InteractiveError::Transport(e.to_string())
    }
}
