//! Withdraw session state machine.
//!
//! One session drives one issuer stream:
//!
//! ```text
//! Opening -> Offered -> AwaitingInvoice -> Settling -> Done
//!                                \             \
//!                                 \             +--> Failed
//!                                  +--> IssuerCanceled | CallerCanceled
//! ```
//!
//! Any step may also end in `Failed`, and server shutdown ends a session in
//! `IssuerCanceled` from any waiting step. The offer registered in `Offered` is
//! removed again whenever the session ends, unless a wallet already resolved
//! it.

use crate::metrics::Metrics;
use crate::{
    InteractiveError, StatusCode, WithdrawRequest, WithdrawResponse, WithdrawStream, PAY_STATUS_OK,
};
use lnurl_proxy_lib::{
    rendezvous, OfferRegistry, PaymentError, RegistryError, RendezvousError, WithdrawParams,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Where a session currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Waiting for the issuer's `open` message.
    Opening,
    /// Offer registered, locator being sent.
    Offered,
    /// Waiting for a wallet, a disconnect or shutdown.
    AwaitingInvoice,
    /// Invoice forwarded, waiting for the issuer's payment result.
    Settling,
    /// The issuer reported a successful payment.
    Done,
    /// The server shut down while the offer was pending.
    IssuerCanceled,
    /// The issuer went away while the offer was pending.
    CallerCanceled,
    /// Any error.
    Failed,
}

impl SessionState {
    /// Whether the session has ended.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Done
                | SessionState::IssuerCanceled
                | SessionState::CallerCanceled
                | SessionState::Failed
        )
    }

    /// Lower-case name used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Opening => "opening",
            SessionState::Offered => "offered",
            SessionState::AwaitingInvoice => "awaiting_invoice",
            SessionState::Settling => "settling",
            SessionState::Done => "done",
            SessionState::IssuerCanceled => "issuer_canceled",
            SessionState::CallerCanceled => "caller_canceled",
            SessionState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a session ended with an error.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] InteractiveError),
    #[error("unexpected {got} message, expected {expected}")]
    UnexpectedMessage {
        expected: &'static str,
        got: &'static str,
    },
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("canceled by server")]
    CanceledByServer,
    /// The issuer reported a failed payment; carries its reason.
    #[error("{0}")]
    PaymentFailed(String),
    #[error("withdraw request was abandoned before an invoice was delivered")]
    RendezvousClosed,
}

impl SessionError {
    /// Status code reported to the issuer.
    pub fn code(&self) -> StatusCode {
        match self {
            SessionError::Registry(RegistryError::EmptyWithdrawId) => StatusCode::InvalidArgument,
            SessionError::Registry(RegistryError::DuplicateWithdrawId(_)) => {
                StatusCode::AlreadyExists
            }
            SessionError::Registry(_) => StatusCode::Internal,
            SessionError::CanceledByServer => StatusCode::Canceled,
            SessionError::Transport(_)
            | SessionError::UnexpectedMessage { .. }
            | SessionError::PaymentFailed(_)
            | SessionError::RendezvousClosed => StatusCode::Unknown,
        }
    }

    /// Terminal state a session ends in with this error.
    pub fn terminal_state(&self) -> SessionState {
        match self {
            SessionError::CanceledByServer => SessionState::IssuerCanceled,
            _ => SessionState::Failed,
        }
    }
}

struct Progress {
    state: SessionState,
    withdraw_id: String,
}

impl Progress {
    fn enter(&mut self, next: SessionState) {
        tracing::debug!(
            withdraw_id = %self.withdraw_id,
            from = %self.state,
            state = %next,
            "withdraw session transition"
        );
        self.state = next;
    }
}

/// Drives one issuer stream from `open` to a terminal state.
pub struct WithdrawSession {
    registry: OfferRegistry,
    shutdown: CancellationToken,
    metrics: Arc<Metrics>,
}

impl WithdrawSession {
    /// Session on `registry` that ends early once `shutdown` is cancelled.
    pub fn new(
        registry: OfferRegistry,
        shutdown: CancellationToken,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            registry,
            shutdown,
            metrics,
        }
    }

    /// Run the session to completion.
    ///
    /// Returns `Done` after a successful payment and `CallerCanceled` when the
    /// issuer disconnected while waiting; every other ending is an error.
    pub async fn run<S>(&self, stream: &mut S) -> Result<SessionState, SessionError>
    where
        S: WithdrawStream + ?Sized,
    {
        let mut progress = Progress {
            state: SessionState::Opening,
            withdraw_id: String::new(),
        };

        let result = self.drive(stream, &mut progress).await;
        let terminal = match &result {
            Ok(state) => *state,
            Err(e) => e.terminal_state(),
        };
        progress.enter(terminal);
        self.record(&result);

        result
    }

    async fn drive<S>(
        &self,
        stream: &mut S,
        progress: &mut Progress,
    ) -> Result<SessionState, SessionError>
    where
        S: WithdrawStream + ?Sized,
    {
        let opened = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                tracing::info!("withdraw stream canceled by server before open");
                return Err(SessionError::CanceledByServer);
            }
            opened = stream.recv() => opened?,
        };
        let (withdraw_id, params) = match opened {
            WithdrawRequest::Open {
                withdraw_id,
                min_amount,
                max_amount,
                description,
            } => (
                withdraw_id,
                WithdrawParams {
                    min_amount,
                    max_amount,
                    description,
                },
            ),
            other => {
                return Err(SessionError::UnexpectedMessage {
                    expected: "open",
                    got: other.kind(),
                })
            }
        };
        progress.withdraw_id = withdraw_id.clone();

        let (payer, receiver) = rendezvous();
        let registration = self
            .registry
            .register(&withdraw_id, Arc::new(payer), params)?;
        self.metrics.record_offer_registered();
        progress.enter(SessionState::Offered);

        stream
            .send(WithdrawResponse::BechString {
                bech_string: registration.locator().to_string(),
            })
            .await?;
        progress.enter(SessionState::AwaitingInvoice);

        let disconnected = stream.disconnected();
        let pending = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                tracing::info!(%withdraw_id, "withdraw canceled by server");
                return Err(SessionError::CanceledByServer);
            }
            _ = disconnected.cancelled() => {
                tracing::info!(%withdraw_id, "issuer disconnected before an invoice arrived");
                return Ok(SessionState::CallerCanceled);
            }
            pending = receiver.recv() => match pending {
                Some(pending) => pending,
                None => return Err(SessionError::RendezvousClosed),
            },
        };
        progress.enter(SessionState::Settling);

        stream
            .send(WithdrawResponse::Invoice {
                invoice: pending.invoice().to_string(),
            })
            .await?;
        self.metrics.record_invoice_forwarded();

        let decision = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                tracing::info!(%withdraw_id, "withdraw canceled by server while settling");
                pending.settle(Err(RendezvousError::Closed.into()));
                return Err(SessionError::CanceledByServer);
            }
            decision = stream.recv() => decision?,
        };

        match decision {
            WithdrawRequest::Pay { status, .. } if status == PAY_STATUS_OK => {
                pending.settle(Ok(()));
                Ok(SessionState::Done)
            }
            WithdrawRequest::Pay { status, reason } => {
                let reason = if reason.is_empty() {
                    format!("payment failed with status {}", status)
                } else {
                    reason
                };
                pending.settle(Err(PaymentError::rejected(reason.clone())));
                Err(SessionError::PaymentFailed(reason))
            }
            other => {
                pending.settle(Err(PaymentError::Internal(format!(
                    "issuer sent {} instead of a payment result",
                    other.kind()
                ))));
                Err(SessionError::UnexpectedMessage {
                    expected: "pay",
                    got: other.kind(),
                })
            }
        }
    }

    fn record(&self, result: &Result<SessionState, SessionError>) {
        match result {
            Ok(SessionState::Done) => self.metrics.record_payment_succeeded(),
            Ok(_) => self.metrics.record_canceled_by_issuer(),
            Err(SessionError::CanceledByServer) => self.metrics.record_canceled_by_server(),
            Err(SessionError::PaymentFailed(_)) => self.metrics.record_payment_failed(),
            Err(SessionError::UnexpectedMessage { .. }) => self.metrics.record_protocol_error(),
            Err(SessionError::Transport(_)) => self.metrics.record_transport_error(),
            Err(_) => {}
        }
    }
}
