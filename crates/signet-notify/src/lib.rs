//! Webhook notification pipeline: filtering, signing, delivery with retry.
//!
//! Given a domain event, the [`Notifier`] resolves which subscriptions are
//! interested, evaluates their filters against the wire payload, signs the
//! serialized body, and delivers it over HTTP with a bounded per-attempt
//! retry policy, aggregating every subscription's outcome into one
//! [`NotificationResult`].
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use signet_core::{EventInfo, MemorySubscriptionStore};
//! use signet_notify::{DefaultWebhookFactory, Notifier, NotifierConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), signet_notify::NotifyError> {
//! let store = Arc::new(MemorySubscriptionStore::new());
//! let notifier =
//!     Notifier::new(store, Arc::new(DefaultWebhookFactory), NotifierConfig::default())?;
//!
//! let event = EventInfo::new("user", "user.created", serde_json::json!({"id": 7}));
//! let result = notifier.notify(event, &CancellationToken::new()).await?;
//! println!("{} delivered, {} failed", result.successes(), result.failures());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod factory;
pub mod filter;
pub mod notifier;
pub mod receiver;
pub mod resolver;
pub mod result;
pub mod retry;
pub mod sender;
pub mod signature;

pub use config::{
    NotifierConfig, ReceiverConfig, SignatureLocation, DEFAULT_SIGNATURE_HEADER,
    DEFAULT_SIGNATURE_QUERY_KEY,
};
pub use error::{
    DeliveryError, FactoryError, FilterError, NotifyError, ReceiveError, Result,
    SubscriptionError,
};
pub use factory::{DefaultWebhookFactory, EventWebhook, FnWebhookFactory, WebhookFactory};
pub use filter::{ExprEvaluator, FilterEvaluator, FilterRegistry, PathEvaluator};
pub use notifier::Notifier;
pub use receiver::WebhookReceiver;
pub use resolver::SubscriptionResolver;
pub use result::{DeliveryAttempt, DeliveryResult, NotificationResult};
pub use retry::{BackoffStrategy, RetryPolicy, RetrySchedule};
pub use sender::{DeliverySender, SignedPayload};
pub use signature::{sign, verify, SignatureEncoding};
