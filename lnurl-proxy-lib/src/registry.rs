//! Withdraw Offer Registry
//!
//! Maps withdraw ids to the offers that issuer sessions are currently holding
//! open. Sessions register offers; wallet callbacks look them up and resolve
//! them.
//!
//! # Thread Safety
//!
//! The map sits behind a private `RwLock`. No lock is held across an `.await`:
//! [`OfferRegistry::resolve`] removes the offer inside the critical section and
//! only then calls into its payer, so an offer can be settled at most once.
//!
//! # Lifetime
//!
//! [`OfferRegistry::register`] returns a [`Registration`] guard. Dropping the
//! guard removes the offer unless it was already resolved, or the id has since
//! been taken by a newer registration.

use crate::codec::{Bech32Codec, LocatorCodec};
use crate::lnurl::{
    LnurlStatusResponse, LnurlWithdrawResponse, PaymentOutcome, CALLBACK_PATH, WITHDRAW_PATH,
    WITHDRAW_TAG,
};
use crate::{InvoicePayer, RegistryError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Amount bounds and description advertised to the wallet.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WithdrawParams {
    /// Minimum withdrawable amount (msat).
    pub min_amount: i64,
    /// Maximum withdrawable amount (msat).
    pub max_amount: i64,
    /// Default invoice description.
    pub description: String,
}

struct WithdrawOffer {
    receiver: Arc<dyn InvoicePayer>,
    params: WithdrawParams,
    generation: u64,
    created_at: i64,
}

struct RegistryInner {
    base_url: String,
    codec: Arc<dyn LocatorCodec>,
    offers: RwLock<HashMap<String, WithdrawOffer>>,
    next_generation: AtomicU64,
}

impl RegistryInner {
    fn release(&self, id: &str, generation: u64) -> bool {
        let mut offers = self.offers.write().unwrap_or_else(|e| e.into_inner());
        match offers.get(id) {
            Some(offer) if offer.generation == generation => {
                offers.remove(id);
                true
            }
            _ => false,
        }
    }
}

/// Shared store of pending withdraw offers.
///
/// Cloning is cheap; all clones see the same offers.
///
/// # Example
///
/// ```
/// use lnurl_proxy_lib::{rendezvous, OfferRegistry, WithdrawParams};
/// use std::sync::Arc;
///
/// let registry = OfferRegistry::new("https://proxy.example");
/// let (payer, _receiver) = rendezvous();
///
/// let registration = registry
///     .register("myid", Arc::new(payer), WithdrawParams::default())
///     .unwrap();
/// assert!(registration.locator().starts_with("LNURL1"));
/// assert!(registry.contains("myid"));
///
/// drop(registration);
/// assert!(registry.is_empty());
/// ```
#[derive(Clone)]
pub struct OfferRegistry {
    inner: Arc<RegistryInner>,
}

impl OfferRegistry {
    /// Creates an empty registry issuing locators under `base_url`.
    ///
    /// `base_url` is used verbatim apart from a trailing `/`; validate it with
    /// [`ProxyConfig`](crate::ProxyConfig) first.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_codec(base_url, Arc::new(Bech32Codec))
    }

    /// Creates an empty registry using a custom locator codec.
    pub fn with_codec(base_url: impl Into<String>, codec: Arc<dyn LocatorCodec>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            inner: Arc::new(RegistryInner {
                base_url,
                codec,
                offers: RwLock::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    /// Registers a pending offer and returns its guard.
    ///
    /// Fails if `id` is empty, already registered, or the codec cannot encode
    /// the withdraw URL. On failure nothing is stored.
    pub fn register(
        &self,
        id: &str,
        receiver: Arc<dyn InvoicePayer>,
        params: WithdrawParams,
    ) -> Result<Registration, RegistryError> {
        if id.is_empty() {
            return Err(RegistryError::EmptyWithdrawId);
        }

        let locator = self.inner.codec.encode(&self.withdraw_url(id))?;
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);

        {
            let mut offers = self.inner.offers.write().unwrap_or_else(|e| e.into_inner());
            if offers.contains_key(id) {
                return Err(RegistryError::DuplicateWithdrawId(id.to_string()));
            }
            offers.insert(
                id.to_string(),
                WithdrawOffer {
                    receiver,
                    params,
                    generation,
                    created_at: chrono::Utc::now().timestamp(),
                },
            );
        }

        tracing::debug!(withdraw_id = %id, generation, "withdraw offer registered");

        Ok(Registration {
            inner: Arc::clone(&self.inner),
            id: id.to_string(),
            generation,
            locator,
        })
    }

    /// Returns the LNURL withdraw parameters for a pending offer.
    pub fn lookup(&self, id: &str) -> Result<LnurlWithdrawResponse, RegistryError> {
        let offers = self.inner.offers.read().unwrap_or_else(|e| e.into_inner());
        let offer = offers.get(id).ok_or(RegistryError::NotFound)?;

        Ok(LnurlWithdrawResponse {
            tag: WITHDRAW_TAG.to_string(),
            k1: id.to_string(),
            callback: self.callback_url(),
            max_withdrawable: offer.params.max_amount,
            min_withdrawable: offer.params.min_amount,
            default_description: offer.params.description.clone(),
        })
    }

    /// Settles a pending offer with `invoice`.
    ///
    /// The offer is removed before its payer is called, so a second resolve of
    /// the same id reports not-found even while the first one is in flight.
    pub async fn resolve(&self, id: &str, invoice: &str) -> PaymentOutcome {
        let offer = {
            let mut offers = self.inner.offers.write().unwrap_or_else(|e| e.into_inner());
            offers.remove(id)
        };

        let Some(offer) = offer else {
            tracing::debug!(withdraw_id = %id, "resolve for unknown withdraw id");
            return LnurlStatusResponse::error(RegistryError::NotFound.to_string());
        };

        tracing::debug!(
            withdraw_id = %id,
            age_secs = chrono::Utc::now().timestamp() - offer.created_at,
            "resolving withdraw offer"
        );

        match offer.receiver.pay_invoice(invoice).await {
            Ok(()) => LnurlStatusResponse::ok(),
            Err(e) => {
                tracing::info!(withdraw_id = %id, error = %e, "withdraw payment failed");
                LnurlStatusResponse::error(e.to_string())
            }
        }
    }

    /// Whether an offer is pending under `id`.
    pub fn contains(&self, id: &str) -> bool {
        let offers = self.inner.offers.read().unwrap_or_else(|e| e.into_inner());
        offers.contains_key(id)
    }

    /// Number of pending offers.
    pub fn len(&self) -> usize {
        let offers = self.inner.offers.read().unwrap_or_else(|e| e.into_inner());
        offers.len()
    }

    /// Whether no offers are pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// URL wallets submit invoices to.
    pub fn callback_url(&self) -> String {
        format!("{}/{}", self.inner.base_url, CALLBACK_PATH)
    }

    /// URL encoded into the locator for `id`.
    pub fn withdraw_url(&self, id: &str) -> String {
        format!(
            "{}/{}?id={}",
            self.inner.base_url,
            WITHDRAW_PATH,
            urlencoding::encode(id)
        )
    }
}

impl std::fmt::Debug for OfferRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfferRegistry")
            .field("base_url", &self.inner.base_url)
            .field("pending", &self.len())
            .finish()
    }
}

/// Ownership of one registered offer.
///
/// Dropping it removes the offer if it is still the one this guard created.
pub struct Registration {
    inner: Arc<RegistryInner>,
    id: String,
    generation: u64,
    locator: String,
}

impl Registration {
    /// The wallet-facing LNURL for this offer.
    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// The registered withdraw id.
    pub fn withdraw_id(&self) -> &str {
        &self.id
    }

    /// Whether the offer is still pending, i.e. not yet resolved.
    pub fn is_pending(&self) -> bool {
        let offers = self.inner.offers.read().unwrap_or_else(|e| e.into_inner());
        offers
            .get(&self.id)
            .is_some_and(|offer| offer.generation == self.generation)
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if self.inner.release(&self.id, self.generation) {
            tracing::debug!(withdraw_id = %self.id, "withdraw offer released");
        }
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .field("locator", &self.locator)
            .finish()
    }
}
