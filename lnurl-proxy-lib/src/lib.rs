//! LNURL withdraw proxy library.
//!
//! Core building blocks shared by the issuer-facing stream handler and the
//! wallet-facing HTTP callbacks:
//!
//! - **Codec**: bech32 LNURL locators ([`codec`])
//! - **Offer Registry**: pending withdraw offers keyed by id ([`OfferRegistry`])
//! - **Rendezvous**: single-use invoice/outcome handoff ([`rendezvous()`])
//!
//! Nothing here touches the network; transports live in
//! `lnurl-proxy-interactive` and `lnurl-proxy-server`.
//!
//! # Example
//!
//! ```
//! use lnurl_proxy_lib::{rendezvous, OfferRegistry, WithdrawParams};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let registry = OfferRegistry::new("https://proxy.example");
//! let (payer, receiver) = rendezvous();
//! let _registration = registry
//!     .register("myid", Arc::new(payer), WithdrawParams::default())
//!     .unwrap();
//!
//! tokio::spawn(async move {
//!     let pending = receiver.recv().await.unwrap();
//!     pending.settle(Ok(()));
//! });
//!
//! assert!(registry.resolve("myid", "lnbc1...").await.is_ok());
//! assert!(!registry.resolve("myid", "lnbc1...").await.is_ok());
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod errors;
pub mod lnurl;
pub mod registry;
pub mod rendezvous;

pub use codec::{Bech32Codec, LocatorCodec};
pub use config::ProxyConfig;
pub use errors::{CodecError, ConfigError, PaymentError, RegistryError, RendezvousError};
pub use lnurl::{LnurlStatus, LnurlStatusResponse, LnurlWithdrawResponse, PaymentOutcome};
pub use registry::{OfferRegistry, Registration, WithdrawParams};
pub use rendezvous::{rendezvous, PendingInvoice, Rendezvous, RendezvousReceiver};

/// Common result alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Capability to pay an invoice on behalf of a withdraw offer.
///
/// Every registered offer carries one. In the proxy it is a [`Rendezvous`]
/// with the issuer session; tests substitute recording or failing payers.
#[async_trait::async_trait]
pub trait InvoicePayer: Send + Sync {
    /// Pay `invoice`, returning once the issuer has reported the outcome.
    async fn pay_invoice(&self, invoice: &str) -> std::result::Result<(), PaymentError>;
}
