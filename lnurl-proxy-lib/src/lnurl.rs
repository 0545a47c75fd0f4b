//! Wallet-facing LNURL-withdraw JSON envelopes.

use serde::{Deserialize, Serialize};

/// `tag` value of an LNURL-withdraw parameters response.
pub const WITHDRAW_TAG: &str = "withdrawRequest";

/// Path segment under which withdraw parameters are served.
pub const WITHDRAW_PATH: &str = "withdraw";

/// Path segment under which wallets submit invoices.
pub const CALLBACK_PATH: &str = "invoice";

/// Parameters returned to a wallet for a pending withdraw offer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LnurlWithdrawResponse {
    /// Always [`WITHDRAW_TAG`].
    pub tag: String,
    /// The withdraw id, echoed back by the wallet on the callback.
    pub k1: String,
    /// URL the wallet calls with its invoice.
    pub callback: String,
    /// Upper bound of the withdrawable amount (msat).
    pub max_withdrawable: i64,
    /// Lower bound of the withdrawable amount (msat).
    pub min_withdrawable: i64,
    /// Description the wallet should put into its invoice.
    pub default_description: String,
}

/// LNURL status values.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum LnurlStatus {
    /// The request succeeded.
    Ok,
    /// The request failed; see `reason`.
    Error,
}

/// The `{status, reason}` envelope LNURL uses both for errors and for the
/// result of an invoice submission.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LnurlStatusResponse {
    /// `OK` or `ERROR`.
    pub status: LnurlStatus,
    /// Human readable failure reason, present only on `ERROR`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reason: Option<String>,
}

impl LnurlStatusResponse {
    /// A successful outcome.
    pub fn ok() -> Self {
        Self {
            status: LnurlStatus::Ok,
            reason: None,
        }
    }

    /// A failed outcome with the given reason.
    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            status: LnurlStatus::Error,
            reason: Some(reason.into()),
        }
    }

    /// Whether the status is `OK`.
    pub fn is_ok(&self) -> bool {
        self.status == LnurlStatus::Ok
    }
}

/// Result of settling an offer, as reported to the wallet.
pub type PaymentOutcome = LnurlStatusResponse;
