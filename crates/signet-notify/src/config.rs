//! Configuration for the notification pipeline.
//!
//! An immutable configuration struct constructed once at startup and handed
//! to the notifier; there is no runtime service-locator or builder-chain
//! registration. The receiver side carries its own smaller configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{retry::RetryPolicy, signature::SignatureEncoding};

/// Where the delivery signature is placed on the outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureLocation {
    /// Signature travels in an HTTP header.
    Header,
    /// Signature is appended as a query-string parameter.
    QueryString,
}

/// Default signature header name, matching the historical wire contract.
pub const DEFAULT_SIGNATURE_HEADER: &str = "X-WEBHOOK-SIGNATURE";

/// Default signature query-string key, matching the historical wire
/// contract.
pub const DEFAULT_SIGNATURE_QUERY_KEY: &str = "webhook-signature";

/// Default per-subscription retry budget (attempts beyond the first).
pub const DEFAULT_RETRY_COUNT: u32 = 3;

/// Default per-attempt HTTP request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Default fan-out bound for concurrent deliveries within one cycle.
pub const DEFAULT_MAX_CONCURRENT_DELIVERIES: usize = 8;

/// Configuration for the notifier and its delivery sender.
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Where to place the delivery signature.
    pub signature_location: SignatureLocation,

    /// Header name used when placement is header-based.
    pub signature_header_name: String,

    /// Query-string key used when placement is query-based.
    pub signature_query_key: String,

    /// Rendering of the HMAC signature on the wire.
    pub signature_encoding: SignatureEncoding,

    /// Retry budget for subscriptions that do not declare their own.
    ///
    /// Bounds total attempts per subscription to `retry_count + 1`.
    pub default_retry_count: u32,

    /// Timeout applied independently to each delivery attempt.
    pub request_timeout: Duration,

    /// Maximum subscriptions delivered to concurrently in one cycle.
    pub max_concurrent_deliveries: usize,

    /// Optional bound on a whole notification cycle.
    ///
    /// When exceeded, no further attempts start; in-flight attempts finish
    /// within their own `request_timeout`.
    pub notification_timeout: Option<Duration>,

    /// Backoff policy between attempts to the same subscription.
    pub retry: RetryPolicy,

    /// User agent string for outbound requests.
    pub user_agent: String,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            signature_location: SignatureLocation::Header,
            signature_header_name: DEFAULT_SIGNATURE_HEADER.to_string(),
            signature_query_key: DEFAULT_SIGNATURE_QUERY_KEY.to_string(),
            signature_encoding: SignatureEncoding::HyphenatedUpper,
            default_retry_count: DEFAULT_RETRY_COUNT,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            max_concurrent_deliveries: DEFAULT_MAX_CONCURRENT_DELIVERIES,
            notification_timeout: None,
            retry: RetryPolicy::default(),
            user_agent: "Signet-Webhook-Notify/1.0".to_string(),
        }
    }
}

/// Configuration for receiver-side signature verification.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Whether inbound signatures are verified at all.
    ///
    /// With verification disabled every payload is accepted; enable it in
    /// any deployment that shares a secret with the sender.
    pub verify_signature: bool,

    /// Shared secret used to recompute inbound signatures.
    pub secret: Option<String>,

    /// Where the sender placed the signature.
    pub signature_location: SignatureLocation,

    /// Header name inspected when placement is header-based.
    pub signature_header_name: String,

    /// Query-string key inspected when placement is query-based.
    pub signature_query_key: String,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            verify_signature: true,
            secret: None,
            signature_location: SignatureLocation::Header,
            signature_header_name: DEFAULT_SIGNATURE_HEADER.to_string(),
            signature_query_key: DEFAULT_SIGNATURE_QUERY_KEY.to_string(),
        }
    }
}

impl ReceiverConfig {
    /// Creates a verifying receiver configuration with the given secret.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self { secret: Some(secret.into()), ..Self::default() }
    }
}
