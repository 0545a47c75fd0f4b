//! Single-use invoice/outcome handoff between a wallet callback and the
//! issuer session that owns the offer.
//!
//! A [`Rendezvous`] is registered as the offer's [`InvoicePayer`]. The wallet
//! side calls [`Rendezvous::deliver`], which hands the invoice to the session
//! and then waits until the session settles it. The session side owns the
//! [`RendezvousReceiver`] and answers through [`PendingInvoice::settle`].
//!
//! Each direction is a `oneshot` channel, so a rendezvous can carry exactly
//! one invoice and exactly one outcome:
//!
//! - a second `deliver` fails with [`RendezvousError::AlreadyUsed`];
//! - if the session drops its receiver, or a pending invoice without settling
//!   it, the deliverer gets [`RendezvousError::Closed`] instead of hanging.
//!
//! # Example
//!
//! ```no_run
//! use lnurl_proxy_lib::rendezvous;
//!
//! # async fn example() {
//! let (rendezvous, receiver) = rendezvous();
//!
//! let session = tokio::spawn(async move {
//!     let pending = receiver.recv().await.unwrap();
//!     assert_eq!(pending.invoice(), "lnbc1...");
//!     pending.settle(Ok(()));
//! });
//!
//! rendezvous.deliver("lnbc1...").await.unwrap();
//! session.await.unwrap();
//! # }
//! ```

use crate::{InvoicePayer, PaymentError, RendezvousError};
use std::sync::Mutex;
use tokio::sync::oneshot;

type Reply = oneshot::Sender<Result<(), PaymentError>>;

struct Handoff {
    invoice: String,
    reply: Reply,
}

/// Create a connected rendezvous pair.
pub fn rendezvous() -> (Rendezvous, RendezvousReceiver) {
    let (tx, rx) = oneshot::channel();
    (
        Rendezvous {
            handoff: Mutex::new(Some(tx)),
        },
        RendezvousReceiver { handoff: rx },
    )
}

/// Wallet-facing half: delivers one invoice and waits for its outcome.
pub struct Rendezvous {
    handoff: Mutex<Option<oneshot::Sender<Handoff>>>,
}

impl Rendezvous {
    /// Hand `invoice` to the session and wait for the payment outcome.
    ///
    /// Must be called at most once.
    pub async fn deliver(&self, invoice: &str) -> Result<(), PaymentError> {
        let handoff = self
            .handoff
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or(RendezvousError::AlreadyUsed)?;

        let (reply, outcome) = oneshot::channel();
        handoff
            .send(Handoff {
                invoice: invoice.to_string(),
                reply,
            })
            .map_err(|_| RendezvousError::Closed)?;

        outcome.await.map_err(|_| RendezvousError::Closed)?
    }

    /// Whether `deliver` has already been called.
    pub fn is_used(&self) -> bool {
        self.handoff
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_none()
    }
}

#[async_trait::async_trait]
impl InvoicePayer for Rendezvous {
    async fn pay_invoice(&self, invoice: &str) -> Result<(), PaymentError> {
        self.deliver(invoice).await
    }
}

/// Session-facing half: yields the delivered invoice.
pub struct RendezvousReceiver {
    handoff: oneshot::Receiver<Handoff>,
}

impl RendezvousReceiver {
    /// Wait for the invoice.
    ///
    /// Returns `None` if the [`Rendezvous`] was dropped without delivering.
    /// Dropping this future (e.g. when another `select!` branch wins) closes
    /// the rendezvous.
    pub async fn recv(self) -> Option<PendingInvoice> {
        self.handoff.await.ok().map(|handoff| PendingInvoice {
            invoice: handoff.invoice,
            reply: handoff.reply,
        })
    }
}

/// An invoice waiting for its payment outcome.
///
/// Dropping it without calling [`settle`](Self::settle) reports
/// [`RendezvousError::Closed`] to the deliverer.
pub struct PendingInvoice {
    invoice: String,
    reply: Reply,
}

impl PendingInvoice {
    /// The invoice submitted by the wallet.
    pub fn invoice(&self) -> &str {
        &self.invoice
    }

    /// Report the payment outcome and release the deliverer.
    pub fn settle(self, outcome: Result<(), PaymentError>) {
        if self.reply.send(outcome).is_err() {
            tracing::debug!("invoice deliverer went away before the outcome was reported");
        }
    }
}

impl std::fmt::Debug for PendingInvoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingInvoice")
            .field("invoice", &self.invoice)
            .finish_non_exhaustive()
    }
}
