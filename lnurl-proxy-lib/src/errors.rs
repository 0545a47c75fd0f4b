//! Error types for withdraw proxy operations.
//!
//! Registry, codec and rendezvous failures are kept apart so that each
//! boundary (issuer stream, wallet HTTP call) can decide how to report them.

/// Failures of the LNURL locator codec.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The URL could not be bech32 encoded (e.g. it exceeds the code length).
    #[error("failed to encode lnurl: {0}")]
    Encode(String),
    /// The locator is not a valid bech32 string.
    #[error("invalid lnurl: {0}")]
    Decode(String),
    /// The locator decoded fine but carries a different human readable part.
    #[error("unexpected lnurl prefix: {0}")]
    UnexpectedHrp(String),
    /// The decoded payload is not a UTF-8 URL.
    #[error("lnurl payload is not valid utf-8")]
    InvalidUtf8,
}

/// Failures of [`OfferRegistry`](crate::OfferRegistry) operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// An offer was registered without a withdraw id.
    #[error("withdraw id must not be empty")]
    EmptyWithdrawId,
    /// Another live offer already owns this withdraw id.
    #[error("withdraw id {0} is already registered")]
    DuplicateWithdrawId(String),
    /// No pending offer exists for the requested withdraw id.
    #[error("withdraw id does not exist")]
    NotFound,
    /// The locator codec rejected the callback URL.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Misuse or teardown of a [`Rendezvous`](crate::Rendezvous).
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendezvousError {
    /// `deliver` was called a second time on the same rendezvous.
    #[error("invoice was already delivered for this withdraw")]
    AlreadyUsed,
    /// The withdraw session ended before reporting a payment result.
    #[error("withdraw session closed before reporting a payment result")]
    Closed,
}

/// Outcome of a failed `pay_invoice` call, relayed verbatim to the wallet.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    /// The issuer refused or failed the payment; carries the issuer's reason.
    #[error("{0}")]
    Rejected(String),
    /// The issuer answered with something other than a payment result.
    #[error("internal error: {0}")]
    Internal(String),
    /// The rendezvous with the issuer session could not complete.
    #[error(transparent)]
    Rendezvous(#[from] RendezvousError),
}

impl PaymentError {
    /// Create a rejection carrying the issuer-supplied reason.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected(reason.into())
    }
}

/// Invalid proxy configuration.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The base URL was not provided.
    #[error("base url is not set, must be provided")]
    MissingBaseUrl,
    /// The base URL is not an absolute http(s) URL.
    #[error("invalid base url {url}: {reason}")]
    InvalidBaseUrl {
        /// The rejected value.
        url: String,
        /// Why it was rejected.
        reason: String,
    },
    /// A listen address was empty or malformed.
    #[error("invalid {field}: {reason}")]
    InvalidAddress {
        /// Which setting was rejected.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}
