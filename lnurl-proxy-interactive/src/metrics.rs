//! Metrics collection for monitoring withdraw sessions.
//!
//! # Example
//!
//! ```rust
//! use lnurl_proxy_interactive::metrics::Metrics;
//!
//! let metrics = Metrics::new();
//!
//! metrics.record_session_opened();
//! metrics.record_offer_registered();
//! metrics.record_payment_succeeded();
//! metrics.record_session_closed();
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.sessions_opened, 1);
//! assert_eq!(snapshot.active_sessions, 0);
//! ```

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Collected metrics for the issuer side of the proxy.
///
/// Thread-safe via atomic operations.
#[derive(Debug)]
pub struct Metrics {
    // Session metrics
    sessions_opened: AtomicU64,
    active_sessions: AtomicU64,

    // Offer metrics
    offers_registered: AtomicU64,
    invoices_forwarded: AtomicU64,
    payments_succeeded: AtomicU64,
    payments_failed: AtomicU64,

    // Cancellation metrics
    canceled_by_server: AtomicU64,
    canceled_by_issuer: AtomicU64,

    // Error metrics
    protocol_errors: AtomicU64,
    transport_errors: AtomicU64,

    start_time: Instant,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self {
            sessions_opened: AtomicU64::new(0),
            active_sessions: AtomicU64::new(0),
            offers_registered: AtomicU64::new(0),
            invoices_forwarded: AtomicU64::new(0),
            payments_succeeded: AtomicU64::new(0),
            payments_failed: AtomicU64::new(0),
            canceled_by_server: AtomicU64::new(0),
            canceled_by_issuer: AtomicU64::new(0),
            protocol_errors: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    // === Session Metrics ===

    /// Record a new issuer stream.
    pub fn record_session_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an issuer stream ending.
    pub fn record_session_closed(&self) {
        self.active_sessions.fetch_sub(1, Ordering::Relaxed);
    }

    // === Offer Metrics ===

    /// Record an offer published to wallets.
    pub fn record_offer_registered(&self) {
        self.offers_registered.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an invoice handed to an issuer.
    pub fn record_invoice_forwarded(&self) {
        self.invoices_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an issuer reporting a successful payment.
    pub fn record_payment_succeeded(&self) {
        self.payments_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an issuer reporting a failed payment.
    pub fn record_payment_failed(&self) {
        self.payments_failed.fetch_add(1, Ordering::Relaxed);
    }

    // === Cancellation Metrics ===

    /// Record a session ended by server shutdown.
    pub fn record_canceled_by_server(&self) {
        self.canceled_by_server.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a session ended by the issuer disconnecting.
    pub fn record_canceled_by_issuer(&self) {
        self.canceled_by_issuer.fetch_add(1, Ordering::Relaxed);
    }

    // === Error Metrics ===

    /// Record a malformed or out-of-order message.
    pub fn record_protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed send or receive.
    pub fn record_transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    // === Snapshot ===

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),

            sessions_opened: self.sessions_opened.load(Ordering::Relaxed),
            active_sessions: self.active_sessions.load(Ordering::Relaxed),

            offers_registered: self.offers_registered.load(Ordering::Relaxed),
            invoices_forwarded: self.invoices_forwarded.load(Ordering::Relaxed),
            payments_succeeded: self.payments_succeeded.load(Ordering::Relaxed),
            payments_failed: self.payments_failed.load(Ordering::Relaxed),

            canceled_by_server: self.canceled_by_server.load(Ordering::Relaxed),
            canceled_by_issuer: self.canceled_by_issuer.load(Ordering::Relaxed),

            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all metrics.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Uptime in seconds since metrics collector was created.
    pub uptime_secs: u64,

    pub sessions_opened: u64,
    pub active_sessions: u64,

    pub offers_registered: u64,
    pub invoices_forwarded: u64,
    pub payments_succeeded: u64,
    pub payments_failed: u64,

    pub canceled_by_server: u64,
    pub canceled_by_issuer: u64,

    pub protocol_errors: u64,
    pub transport_errors: u64,
}

impl MetricsSnapshot {
    /// Total errors of any kind.
    pub fn total_errors(&self) -> u64 {
        self.protocol_errors + self.transport_errors
    }

    /// Format as JSON for logging.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
