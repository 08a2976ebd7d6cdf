//! Error types for the notification pipeline.
//!
//! Two layers: call-level errors ([`NotifyError`]) abort a whole
//! notification cycle, while per-subscription failures are classified and
//! recorded on that subscription's delivery result without touching other
//! subscribers. Delivery errors carry enough context for retry decisions.

use thiserror::Error;

use signet_core::CoreError;

/// Result type alias for notification operations.
pub type Result<T> = std::result::Result<T, NotifyError>;

/// Call-level failure of a notification cycle.
///
/// Only infrastructure-level conditions end up here; one subscriber's bad
/// endpoint or failing factory never does.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The subscription store could not be read.
    ///
    /// Nothing is delivered when resolution fails; the cycle fails fast.
    #[error(transparent)]
    Store(#[from] CoreError),

    /// A subscription references a filter format with no registered
    /// evaluator.
    ///
    /// This is a configuration defect, surfaced rather than silently
    /// skipped.
    #[error("unsupported filter format: {format}")]
    UnsupportedFilterFormat {
        /// The format name no evaluator is registered for
        format: String,
    },

    /// A tenant-scoped call was made without a store provider configured.
    #[error("no store provider configured for tenant-scoped notification")]
    MissingStoreProvider,

    /// The pipeline itself could not be constructed.
    #[error("notifier configuration error: {message}")]
    Configuration {
        /// Configuration error message
        message: String,
    },
}

impl NotifyError {
    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }
}

/// Failure of a single delivery attempt.
///
/// Classification drives the retry state machine: network trouble,
/// timeouts, and server errors are retryable; an endpoint that rejects the
/// payload is not.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    /// Network-level connectivity failure.
    #[error("network connection failed: {message}")]
    Network {
        /// Error message describing the network failure
        message: String,
    },

    /// Per-attempt timeout exceeded.
    #[error("request timeout after {timeout_seconds}s")]
    Timeout {
        /// Number of seconds before the attempt timed out
        timeout_seconds: u64,
    },

    /// The endpoint rejected the payload (4xx-class response).
    ///
    /// Permanent: delivery stops immediately regardless of remaining retry
    /// budget.
    #[error("delivery rejected: HTTP {status_code}")]
    Rejected {
        /// HTTP status code (4xx)
        status_code: u16,
        /// Response body content, truncated
        body: String,
    },

    /// The endpoint failed transiently (5xx-class response).
    #[error("server error: HTTP {status_code}")]
    ServerError {
        /// HTTP status code (5xx)
        status_code: u16,
        /// Response body content, truncated
        body: String,
    },

    /// Delivery was cancelled before the attempt started.
    #[error("delivery cancelled")]
    Cancelled,
}

impl DeliveryError {
    /// Creates a network error from a message.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    /// Creates a timeout error.
    pub fn timeout(timeout_seconds: u64) -> Self {
        Self::Timeout { timeout_seconds }
    }

    /// Creates a rejected (4xx) error.
    pub fn rejected(status_code: u16, body: impl Into<String>) -> Self {
        Self::Rejected { status_code, body: body.into() }
    }

    /// Creates a server (5xx) error.
    pub fn server_error(status_code: u16, body: impl Into<String>) -> Self {
        Self::ServerError { status_code, body: body.into() }
    }

    /// Whether another attempt may be made for this failure.
    ///
    /// Network errors, timeouts, and 5xx responses are retryable; a 4xx
    /// rejection or cancellation ends the state machine.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout { .. } | Self::ServerError { .. } => true,
            Self::Rejected { .. } | Self::Cancelled => false,
        }
    }
}

/// Failure evaluating a filter expression.
#[derive(Debug, Clone, Error)]
pub enum FilterError {
    /// No evaluator is registered for the requested format.
    #[error("unsupported filter format: {format}")]
    UnsupportedFormat {
        /// The format name no evaluator is registered for
        format: String,
    },

    /// The expression is malformed for its (supported) format.
    #[error("invalid filter expression {expression:?}: {message}")]
    InvalidExpression {
        /// The offending expression
        expression: String,
        /// Parse or evaluation error detail
        message: String,
    },
}

impl FilterError {
    /// Creates an unsupported-format error.
    pub fn unsupported(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat { format: format.into() }
    }

    /// Creates an invalid-expression error.
    pub fn invalid(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidExpression { expression: expression.into(), message: message.into() }
    }
}

/// Failure constructing a webhook payload for one subscription.
///
/// Wraps the underlying cause; recorded as that subscription's delivery
/// failure without aborting the cycle for other subscribers.
#[derive(Debug, Error)]
#[error("webhook payload construction failed: {message}")]
pub struct FactoryError {
    /// What went wrong building the payload
    pub message: String,
    /// Underlying cause, when one exists
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl FactoryError {
    /// Creates a factory error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), source: None }
    }

    /// Creates a factory error wrapping an underlying cause.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self { message: message.into(), source: Some(Box::new(source)) }
    }
}

/// Classified per-subscription failure recorded on a delivery result.
#[derive(Debug, Clone, Error)]
pub enum SubscriptionError {
    /// The webhook factory failed for this subscription.
    #[error("payload construction failed: {0}")]
    Factory(String),

    /// A filter expression for this subscription is malformed.
    #[error("filter evaluation failed: {0}")]
    Filter(String),

    /// Delivery failed after exhausting the attempt budget, or was
    /// rejected outright.
    #[error(transparent)]
    Delivery(DeliveryError),
}

/// Failure verifying an inbound webhook on the receiving side.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReceiveError {
    /// The recomputed signature does not match the one presented.
    ///
    /// The payload must be discarded, never processed as a valid event.
    #[error("webhook signature verification failed")]
    SignatureInvalid,

    /// Verification is mandated but the request carries no signature.
    ///
    /// A configuration or caller error, not a not-matched result.
    #[error("webhook signature missing from configured location")]
    MissingSignature,

    /// Verification is mandated but no shared secret is configured.
    #[error("signature verification enabled but no secret configured")]
    MissingSecret,
}
