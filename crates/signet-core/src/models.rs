//! Domain models and strongly-typed identifiers.
//!
//! Defines application events, webhook subscriptions, and newtype ID
//! wrappers for compile-time type safety. Events are immutable once
//! constructed; subscriptions are owned by the store and only read by the
//! notification pipeline during a cycle.

use std::{collections::HashMap, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::error::CoreError;

/// Strongly-typed event identifier.
///
/// Wraps a UUID to prevent mixing with other ID types. Events are immutable
/// once created, and this ID follows them through their entire lifecycle.
///
/// # Example
///
/// ```
/// use signet_core::models::EventId;
/// let event_id = EventId::new();
/// println!("notifying event: {}", event_id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    /// Creates a new random event ID.
    ///
    /// Uses UUID v4 for globally unique identifiers without coordination.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EventId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Strongly-typed subscription identifier.
///
/// Assigned by the store when a subscription is created from its
/// descriptor. Stable for the lifetime of the subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub Uuid);

impl SubscriptionId {
    /// Creates a new random subscription ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for SubscriptionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Strongly-typed tenant identifier.
///
/// Provides multi-tenancy isolation. When a deployment is tenanted, every
/// store lookup and notification cycle is scoped to one tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub Uuid);

impl TenantId {
    /// Creates a new random tenant ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for TenantId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// A domain event produced by the application.
///
/// Events are the input to a notification cycle. `subject` names the event
/// category (e.g. `"user"`), `event_type` the concrete occurrence
/// (e.g. `"user.created"`). The `data` payload is opaque to the pipeline
/// and carried through to the webhook factory.
///
/// Immutable once constructed; the builder-style `with_*` methods consume
/// and return the value during construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventInfo {
    /// Unique identifier, generator-assigned at construction.
    pub id: EventId,

    /// Event category, e.g. `"user"`.
    pub subject: String,

    /// Concrete event type, e.g. `"user.created"`.
    ///
    /// Matched against subscription `event_types` by exact string
    /// membership, never by prefix or glob.
    pub event_type: String,

    /// When the event occurred.
    pub timestamp: DateTime<Utc>,

    /// Optional schema version of the event data.
    pub data_version: Option<String>,

    /// Opaque event payload.
    pub data: serde_json::Value,
}

impl EventInfo {
    /// Creates a new event with a fresh ID and the current timestamp.
    pub fn new(
        subject: impl Into<String>,
        event_type: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            id: EventId::new(),
            subject: subject.into(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            data_version: None,
            data,
        }
    }

    /// Sets an explicit event ID, replacing the generated one.
    #[must_use]
    pub fn with_id(mut self, id: EventId) -> Self {
        self.id = id;
        self
    }

    /// Sets an explicit timestamp, replacing the construction time.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Sets the schema version of the event data.
    #[must_use]
    pub fn with_data_version(mut self, version: impl Into<String>) -> Self {
        self.data_version = Some(version.into());
        self
    }
}

/// One or more events produced by a single logical trigger.
///
/// Most notification cycles carry exactly one event; batched triggers may
/// carry several. Consumers that require a single event use [`single`],
/// which fails with [`CoreError::InvalidState`] otherwise.
///
/// [`single`]: EventNotification::single
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventNotification {
    /// When the notification was assembled.
    pub timestamp: DateTime<Utc>,

    events: Vec<EventInfo>,
}

impl EventNotification {
    /// Creates a notification carrying exactly one event.
    pub fn new(event: EventInfo) -> Self {
        Self { timestamp: Utc::now(), events: vec![event] }
    }

    /// Creates a notification carrying a batch of events.
    pub fn batch(events: Vec<EventInfo>) -> Self {
        Self { timestamp: Utc::now(), events }
    }

    /// All events in this notification, in trigger order.
    pub fn events(&self) -> &[EventInfo] {
        &self.events
    }

    /// Number of events carried.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the notification carries no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns the single event this notification carries.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidState`] when the notification carries
    /// zero or multiple events.
    pub fn single(&self) -> Result<&EventInfo, CoreError> {
        match self.events.as_slice() {
            [event] => Ok(event),
            events => Err(CoreError::invalid_state(format!(
                "expected exactly one event, notification carries {}",
                events.len()
            ))),
        }
    }
}

/// A filter gating whether a subscription receives a given event.
///
/// `format` selects which evaluator applies; `expression` is evaluated by
/// that evaluator as a boolean predicate over the webhook payload. The
/// wildcard expression `"*"` matches everything regardless of format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookFilter {
    /// Evaluator format name, e.g. `"linq"` or `"jsonpath"`.
    pub format: String,

    /// Boolean predicate expression in the named format.
    pub expression: String,
}

impl WebhookFilter {
    /// The universal wildcard expression.
    pub const WILDCARD: &'static str = "*";

    /// Creates a filter from a format name and expression.
    pub fn new(format: impl Into<String>, expression: impl Into<String>) -> Self {
        Self { format: format.into(), expression: expression.into() }
    }

    /// Creates a wildcard filter that matches every payload.
    pub fn wildcard() -> Self {
        Self { format: String::new(), expression: Self::WILDCARD.to_string() }
    }

    /// Whether this filter is the universal wildcard.
    ///
    /// Wildcard filters match without consulting any evaluator, so the
    /// format is not validated for them.
    pub fn is_wildcard(&self) -> bool {
        self.expression == Self::WILDCARD
    }
}

/// Descriptor used to create a subscription.
///
/// Carries everything the subscriber declares; the store assigns the ID
/// and timestamps when turning the descriptor into a
/// [`WebhookSubscription`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSubscriptionInfo {
    /// Human-readable subscription name.
    pub name: String,

    /// Event types this subscription is interested in.
    pub event_types: Vec<String>,

    /// Absolute destination URL for deliveries.
    pub destination_url: Url,

    /// Shared secret used to sign deliveries; absent means unsigned.
    pub secret: Option<String>,

    /// Extra headers sent verbatim with every delivery.
    pub headers: HashMap<String, String>,

    /// Ordered filter list; empty means match everything.
    pub filters: Vec<WebhookFilter>,

    /// Retry attempts beyond the first; `None` uses the deployment default.
    pub retry_count: Option<u32>,

    /// Free-form annotations.
    pub metadata: HashMap<String, String>,

    /// Owning tenant in multi-tenant deployments.
    pub tenant_id: Option<TenantId>,
}

impl WebhookSubscriptionInfo {
    /// Creates a descriptor for the given name and destination.
    pub fn new(name: impl Into<String>, destination_url: Url) -> Self {
        Self {
            name: name.into(),
            event_types: Vec::new(),
            destination_url,
            secret: None,
            headers: HashMap::new(),
            filters: Vec::new(),
            retry_count: None,
            metadata: HashMap::new(),
            tenant_id: None,
        }
    }

    /// Adds an event type of interest.
    #[must_use]
    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_types.push(event_type.into());
        self
    }

    /// Sets the signing secret.
    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Adds a filter to the ordered filter list.
    #[must_use]
    pub fn with_filter(mut self, filter: WebhookFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Adds a header sent verbatim with every delivery.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets the per-subscription retry budget (attempts beyond the first).
    #[must_use]
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = Some(retry_count);
        self
    }

    /// Adds a metadata annotation.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Scopes the subscription to a tenant.
    #[must_use]
    pub fn with_tenant(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    /// Validates the descriptor before store insertion.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] when the name is empty, no event
    /// types are declared, or the destination URL is not http(s).
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.name.trim().is_empty() {
            return Err(CoreError::invalid_input("subscription name must not be empty"));
        }
        if self.event_types.is_empty() {
            return Err(CoreError::invalid_input(
                "subscription must declare at least one event type",
            ));
        }
        if !matches!(self.destination_url.scheme(), "http" | "https") {
            return Err(CoreError::invalid_input(format!(
                "destination URL must be http or https, got {}",
                self.destination_url.scheme()
            )));
        }
        Ok(())
    }
}

/// A subscriber's registration for webhook deliveries.
///
/// Owned exclusively by the store; the notification pipeline holds only
/// transient read references during a cycle and never mutates one. State
/// transitions (activate/deactivate, field updates, removal) go through the
/// store contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSubscription {
    /// Store-assigned unique identifier.
    pub id: SubscriptionId,

    /// Human-readable subscription name.
    pub name: String,

    /// Event types this subscription is interested in.
    ///
    /// Matching is exact-string membership.
    pub event_types: Vec<String>,

    /// Absolute destination URL for deliveries.
    pub destination_url: Url,

    /// Shared secret used to sign deliveries; absent means unsigned.
    pub secret: Option<String>,

    /// Extra headers sent verbatim with every delivery.
    pub headers: HashMap<String, String>,

    /// Ordered filter list; empty means match everything.
    pub filters: Vec<WebhookFilter>,

    /// Retry attempts beyond the first; `None` uses the deployment default.
    ///
    /// Bounds total attempts to `retry_count + 1`; never unbounded.
    pub retry_count: Option<u32>,

    /// Whether the subscription participates in resolution.
    ///
    /// Inactive subscriptions are never matched, regardless of event types.
    pub is_active: bool,

    /// Free-form annotations.
    pub metadata: HashMap<String, String>,

    /// Owning tenant in multi-tenant deployments.
    pub tenant_id: Option<TenantId>,

    /// When the subscription was created.
    pub created_at: DateTime<Utc>,

    /// When the subscription was last updated.
    pub updated_at: DateTime<Utc>,
}

impl WebhookSubscription {
    /// Materializes a subscription from its descriptor.
    ///
    /// Called by store implementations when creating; new subscriptions
    /// start active.
    pub fn from_info(id: SubscriptionId, info: WebhookSubscriptionInfo) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: info.name,
            event_types: info.event_types,
            destination_url: info.destination_url,
            secret: info.secret,
            headers: info.headers,
            filters: info.filters,
            retry_count: info.retry_count,
            is_active: true,
            metadata: info.metadata,
            tenant_id: info.tenant_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this subscription declares interest in the given event type.
    ///
    /// Exact-string membership; no prefix or glob semantics.
    pub fn listens_to(&self, event_type: &str) -> bool {
        self.event_types.iter().any(|t| t == event_type)
    }
}
