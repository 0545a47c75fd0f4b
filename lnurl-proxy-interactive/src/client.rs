//! Issuer-side client for the withdraw stream.
//!
//! # Example
//!
//! ```no_run
//! use lnurl_proxy_interactive::WithdrawClient;
//! use lnurl_proxy_lib::WithdrawParams;
//!
//! # async fn example() -> lnurl_proxy_interactive::Result<()> {
//! let mut client = WithdrawClient::connect("127.0.0.1:10512").await?;
//! let lnurl = client
//!     .open("myid", &WithdrawParams { min_amount: 1000, max_amount: 5000, description: "tip".into() })
//!     .await?;
//! println!("scan {}", lnurl);
//!
//! let invoice = client.next_invoice().await?;
//! // ... pay `invoice` ...
//! client.report(Ok(())).await?;
//! # Ok(())
//! # }
//! ```

use crate::transport::{ClientStream, FramedStream};
use crate::{InteractiveError, Result, WithdrawRequest, WithdrawResponse};
use lnurl_proxy_lib::WithdrawParams;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, ToSocketAddrs};

/// Opens withdraw offers on a proxy and reports payment results.
pub struct WithdrawClient<S = TcpStream> {
    stream: ClientStream<S>,
}

impl WithdrawClient<TcpStream> {
    /// Connect to a proxy's issuer listener.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let socket = TcpStream::connect(addr)
            .await
            .map_err(|e| InteractiveError::Transport(format!("Failed to connect: {}", e)))?;
        socket.set_nodelay(true)?;
        Ok(Self::new(socket))
    }
}

impl<S> WithdrawClient<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Use an already connected byte stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream: FramedStream::new(stream),
        }
    }

    /// Publish an offer and return its LNURL.
    pub async fn open(&mut self, withdraw_id: &str, params: &WithdrawParams) -> Result<String> {
        self.stream
            .send_frame(&WithdrawRequest::Open {
                withdraw_id: withdraw_id.to_string(),
                min_amount: params.min_amount,
                max_amount: params.max_amount,
                description: params.description.clone(),
            })
            .await?;

        match self.stream.recv_frame().await? {
            WithdrawResponse::BechString { bech_string } => Ok(bech_string),
            other => Err(unexpected(other, "bech_string")),
        }
    }

    /// Wait until a wallet submits an invoice for the open offer.
    pub async fn next_invoice(&mut self) -> Result<String> {
        match self.stream.recv_frame().await? {
            WithdrawResponse::Invoice { invoice } => Ok(invoice),
            other => Err(unexpected(other, "invoice")),
        }
    }

    /// Report the outcome of paying the forwarded invoice.
    pub async fn report(&mut self, outcome: std::result::Result<(), String>) -> Result<()> {
        let msg = match outcome {
            Ok(()) => WithdrawRequest::paid(),
            Err(reason) => WithdrawRequest::payment_failed(reason),
        };
        self.stream.send_frame(&msg).await
    }

    /// Receive whatever the proxy sends next, e.g. a final status frame.
    pub async fn recv(&mut self) -> Result<WithdrawResponse> {
        self.stream.recv_frame().await
    }

    /// Close the connection, abandoning any open offer.
    pub async fn close(mut self) -> Result<()> {
        self.stream.close().await
    }
}

fn unexpected(msg: WithdrawResponse, expected: &str) -> InteractiveError {
    match msg {
        WithdrawResponse::Status { code, message } => InteractiveError::Status { code, message },
        other => InteractiveError::Protocol(format!(
            "unexpected {} message, expected {}",
            other.kind(),
            expected
        )),
    }
}
