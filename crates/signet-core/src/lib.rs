//! Core domain models and the subscription store contract.
//!
//! Provides strongly-typed domain primitives, subscription definitions, and
//! error handling for the webhook notification system. The notification
//! pipeline crate depends on these foundational types; the store contract
//! lets deployments plug in their own persistence while tests and embedded
//! use cases rely on the bundled in-memory implementation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod models;
pub mod store;

pub use error::{CoreError, Result};
pub use models::{
    EventId, EventInfo, EventNotification, SubscriptionId, TenantId, WebhookFilter,
    WebhookSubscription, WebhookSubscriptionInfo,
};
pub use store::{
    MemoryStoreProvider, MemorySubscriptionStore, SubscriptionStore, SubscriptionStoreProvider,
};
