//! Webhook payload construction.
//!
//! The wire-format payload type is caller-defined; the pipeline treats it
//! as an opaque serializable value. Deployments implement
//! [`WebhookFactory`] for their own payload schema (the factory may enrich
//! from external lookups), or use [`DefaultWebhookFactory`] which produces
//! the bundled [`EventWebhook`] shape.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use signet_core::{EventNotification, WebhookSubscription};

use crate::error::FactoryError;

/// Builds the wire-format payload for one matching subscription.
///
/// Called once per matching subscription per notification cycle. A failure
/// here (enrichment lookup failed, required event data absent) is recorded
/// as that subscription's delivery failure and never aborts the cycle for
/// other subscribers.
#[async_trait]
pub trait WebhookFactory<W>: Send + Sync {
    /// Constructs the payload delivered to `subscription` for
    /// `notification`.
    async fn create(
        &self,
        subscription: &WebhookSubscription,
        notification: &EventNotification,
    ) -> Result<W, FactoryError>;
}

/// Default wire payload carrying the event envelope plus its data.
///
/// Event data fields are flattened to the top level of the JSON object, so
/// filters reference them exactly as they appear on the wire: an event
/// with data `{"foo": "bar"}` serializes with a top-level `"foo"` field
/// alongside `"event_name"`, `"subject"`, and the rest of the envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventWebhook {
    /// Event identifier, stringified.
    pub id: String,

    /// Concrete event type, e.g. `"user.created"`.
    pub event_name: String,

    /// Event category, e.g. `"user"`.
    pub subject: String,

    /// When the event occurred.
    pub timestamp: DateTime<Utc>,

    /// Schema version of the event data, when declared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_version: Option<String>,

    /// Event data fields, flattened onto the payload object.
    #[serde(flatten)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

/// Factory producing [`EventWebhook`] payloads from single-event
/// notifications.
pub struct DefaultWebhookFactory;

#[async_trait]
impl WebhookFactory<EventWebhook> for DefaultWebhookFactory {
    async fn create(
        &self,
        _subscription: &WebhookSubscription,
        notification: &EventNotification,
    ) -> Result<EventWebhook, FactoryError> {
        let event = notification
            .single()
            .map_err(|e| FactoryError::with_source("notification must carry one event", e))?;

        let data = match &event.data {
            serde_json::Value::Object(map) => map.clone(),
            serde_json::Value::Null => serde_json::Map::new(),
            other => {
                // Non-object data cannot be flattened; nest it under "data".
                let mut map = serde_json::Map::new();
                map.insert("data".to_string(), other.clone());
                map
            },
        };

        Ok(EventWebhook {
            id: event.id.to_string(),
            event_name: event.event_type.clone(),
            subject: event.subject.clone(),
            timestamp: event.timestamp,
            data_version: event.data_version.clone(),
            data,
        })
    }
}

/// Factory adapter wrapping a closure, for deployments whose payload
/// construction is a pure function of the notification.
pub struct FnWebhookFactory<W, F> {
    build: F,
    _marker: std::marker::PhantomData<fn() -> W>,
}

impl<W, F> FnWebhookFactory<W, F>
where
    F: Fn(&WebhookSubscription, &EventNotification) -> Result<W, FactoryError> + Send + Sync,
{
    /// Wraps a build function as a factory.
    pub fn new(build: F) -> Self {
        Self { build, _marker: std::marker::PhantomData }
    }
}

#[async_trait]
impl<W, F> WebhookFactory<W> for FnWebhookFactory<W, F>
where
    W: Send,
    F: Fn(&WebhookSubscription, &EventNotification) -> Result<W, FactoryError> + Send + Sync,
{
    async fn create(
        &self,
        subscription: &WebhookSubscription,
        notification: &EventNotification,
    ) -> Result<W, FactoryError> {
        (self.build)(subscription, notification)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use signet_core::{EventInfo, SubscriptionId, WebhookSubscriptionInfo};
    use url::Url;

    use super::*;

    fn subscription() -> WebhookSubscription {
        let info = WebhookSubscriptionInfo::new(
            "test",
            Url::parse("https://example.com/hooks").unwrap(),
        )
        .with_event_type("user.created");
        WebhookSubscription::from_info(SubscriptionId::new(), info)
    }

    #[tokio::test]
    async fn event_data_flattens_to_top_level() {
        let event = EventInfo::new("user", "user.created", json!({"foo": "bar", "n": 2}));
        let notification = EventNotification::new(event);

        let webhook =
            DefaultWebhookFactory.create(&subscription(), &notification).await.unwrap();
        let value = serde_json::to_value(&webhook).unwrap();

        assert_eq!(value["event_name"], "user.created");
        assert_eq!(value["subject"], "user");
        assert_eq!(value["foo"], "bar");
        assert_eq!(value["n"], 2);
    }

    #[tokio::test]
    async fn non_object_data_nests_under_data_key() {
        let event = EventInfo::new("metric", "metric.sampled", json!(41.5));
        let notification = EventNotification::new(event);

        let webhook =
            DefaultWebhookFactory.create(&subscription(), &notification).await.unwrap();
        let value = serde_json::to_value(&webhook).unwrap();
        assert_eq!(value["data"], 41.5);
    }

    #[tokio::test]
    async fn batched_notification_is_a_factory_error() {
        let notification = EventNotification::batch(vec![
            EventInfo::new("user", "user.created", json!({})),
            EventInfo::new("user", "user.deleted", json!({})),
        ]);

        let error = DefaultWebhookFactory
            .create(&subscription(), &notification)
            .await
            .expect_err("two events");
        assert!(error.to_string().contains("one event"));
    }

    #[tokio::test]
    async fn fn_factory_adapts_closures() {
        let factory = FnWebhookFactory::new(|_sub, notification: &EventNotification| {
            let event = notification
                .single()
                .map_err(|e| FactoryError::with_source("single event required", e))?;
            Ok(json!({"kind": event.event_type}))
        });

        let notification =
            EventNotification::new(EventInfo::new("user", "user.created", json!({})));
        let payload = factory.create(&subscription(), &notification).await.unwrap();
        assert_eq!(payload["kind"], "user.created");
    }
}
