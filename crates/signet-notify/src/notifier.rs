//! Notification cycle orchestration.
//!
//! The notifier turns one event into deliveries: resolve interested
//! subscriptions, build and filter the payload per subscription, sign, and
//! deliver with retry, aggregating everything into one
//! [`NotificationResult`]. Subscriptions are processed concurrently up to
//! the configured fan-out bound; one subscriber's failure never aborts the
//! cycle for the others.

use std::sync::Arc;

use bytes::Bytes;
use futures::{stream, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use signet_core::{
    EventInfo, EventNotification, SubscriptionStore, SubscriptionStoreProvider, TenantId,
    WebhookSubscription,
};

use crate::{
    config::NotifierConfig,
    error::{FilterError, NotifyError, Result, SubscriptionError},
    factory::WebhookFactory,
    filter::FilterRegistry,
    resolver::SubscriptionResolver,
    result::{DeliveryResult, NotificationResult},
    sender::{DeliverySender, SignedPayload},
    signature,
};

/// Orchestrates notification cycles for payloads of type `W`.
///
/// Composed once at startup from the store, a payload factory, and an
/// immutable [`NotifierConfig`]; there is no runtime service registration.
/// The filter registry defaults to the bundled evaluators and can be
/// replaced for deployments with custom formats.
pub struct Notifier<W> {
    resolver: SubscriptionResolver,
    factory: Arc<dyn WebhookFactory<W>>,
    filters: FilterRegistry,
    sender: DeliverySender,
    config: NotifierConfig,
}

impl<W> Notifier<W>
where
    W: Serialize + Send + Sync,
{
    /// Creates a notifier over the given store and payload factory.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Configuration`] when the configuration is
    /// unusable (zero fan-out bound, HTTP client cannot be built).
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        factory: Arc<dyn WebhookFactory<W>>,
        config: NotifierConfig,
    ) -> Result<Self> {
        if config.max_concurrent_deliveries == 0 {
            return Err(NotifyError::configuration("max_concurrent_deliveries must be at least 1"));
        }
        let sender = DeliverySender::new(&config)?;

        Ok(Self {
            resolver: SubscriptionResolver::new(store),
            factory,
            filters: FilterRegistry::with_defaults(),
            sender,
            config,
        })
    }

    /// Replaces the filter registry.
    #[must_use]
    pub fn with_filters(mut self, filters: FilterRegistry) -> Self {
        self.filters = filters;
        self
    }

    /// Adds a per-tenant store provider, enabling [`notify_tenant`].
    ///
    /// [`notify_tenant`]: Notifier::notify_tenant
    #[must_use]
    pub fn with_store_provider(mut self, provider: Arc<dyn SubscriptionStoreProvider>) -> Self {
        self.resolver = self.resolver.clone().with_provider(provider);
        self
    }

    /// Runs one notification cycle for an event.
    ///
    /// Zero matching subscriptions is a normal outcome, returning an empty
    /// result. Per-subscription failures are recorded in the result;
    /// only infrastructure-level conditions (store unreachable, a filter
    /// format with no evaluator, cancellation before resolution) fail the
    /// call itself.
    pub async fn notify(
        &self,
        event: EventInfo,
        cancel: &CancellationToken,
    ) -> Result<NotificationResult> {
        let subscriptions = self.resolver.resolve(&event.event_type).await?;
        self.run_cycle(event, subscriptions, cancel).await
    }

    /// Runs one notification cycle scoped to a tenant's subscriptions.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::MissingStoreProvider`] when the notifier was
    /// built without a store provider.
    pub async fn notify_tenant(
        &self,
        tenant_id: TenantId,
        event: EventInfo,
        cancel: &CancellationToken,
    ) -> Result<NotificationResult> {
        let subscriptions = self.resolver.resolve_tenant(tenant_id, &event.event_type).await?;
        self.run_cycle(event, subscriptions, cancel).await
    }

    async fn run_cycle(
        &self,
        event: EventInfo,
        subscriptions: Vec<WebhookSubscription>,
        cancel: &CancellationToken,
    ) -> Result<NotificationResult> {
        let span = info_span!(
            "notification_cycle",
            event_id = %event.id,
            event_type = %event.event_type,
            candidates = subscriptions.len(),
        );

        async move {
            let event_id = event.id;
            if subscriptions.is_empty() {
                debug!("no subscriptions interested");
                return Ok(NotificationResult::empty(event_id));
            }

            let notification = EventNotification::new(event);

            // The cycle-level deadline cancels a child token so no further
            // attempts start; in-flight attempts finish within their own
            // per-attempt timeout.
            let cycle_cancel = cancel.child_token();
            let deadline = self.config.notification_timeout.map(|timeout| {
                let token = cycle_cancel.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(timeout).await;
                    token.cancel();
                })
            });

            let outcomes: Vec<Result<Option<DeliveryResult>>> = stream::iter(subscriptions)
                .map(|subscription| {
                    let notification = &notification;
                    let cycle_cancel = &cycle_cancel;
                    async move {
                        self.process_subscription(&subscription, notification, cycle_cancel).await
                    }
                })
                .buffer_unordered(self.config.max_concurrent_deliveries)
                .collect()
                .await;

            if let Some(deadline) = deadline {
                deadline.abort();
            }

            let mut results = Vec::new();
            for outcome in outcomes {
                if let Some(result) = outcome? {
                    results.push(result);
                }
            }

            let result = NotificationResult::new(event_id, results);
            info!(
                matched = result.matched(),
                successes = result.successes(),
                failures = result.failures(),
                "notification cycle complete"
            );
            Ok(result)
        }
        .instrument(span)
        .await
    }

    /// Runs the per-subscription pipeline: build, filter, sign, deliver.
    ///
    /// Returns `Ok(None)` when the subscription is skipped (cancelled
    /// before starting, or no filter matched). The payload is built before
    /// filter evaluation because filters are predicates over the wire
    /// payload, not the raw event.
    async fn process_subscription(
        &self,
        subscription: &WebhookSubscription,
        notification: &EventNotification,
        cancel: &CancellationToken,
    ) -> Result<Option<DeliveryResult>> {
        let event_id = notification.events().first().map(|e| e.id).unwrap_or_default();

        if cancel.is_cancelled() {
            debug!(subscription_id = %subscription.id, "cycle cancelled, subscription skipped");
            return Ok(None);
        }

        let payload = match self.factory.create(subscription, notification).await {
            Ok(payload) => payload,
            Err(error) => {
                warn!(subscription_id = %subscription.id, %error, "payload construction failed");
                return Ok(Some(DeliveryResult::not_attempted(
                    subscription.id,
                    &subscription.name,
                    SubscriptionError::Factory(error.to_string()),
                )));
            },
        };

        let wire = match serde_json::to_value(&payload) {
            Ok(wire) => wire,
            Err(error) => {
                warn!(subscription_id = %subscription.id, %error, "payload serialization failed");
                return Ok(Some(DeliveryResult::not_attempted(
                    subscription.id,
                    &subscription.name,
                    SubscriptionError::Factory(format!("payload serialization failed: {error}")),
                )));
            },
        };

        match self.filters.subscription_matches(subscription, &wire).await {
            Ok(true) => {},
            Ok(false) => {
                debug!(subscription_id = %subscription.id, "no filter matched, skipped");
                return Ok(None);
            },
            Err(FilterError::UnsupportedFormat { format }) => {
                return Err(NotifyError::UnsupportedFilterFormat { format });
            },
            Err(error @ FilterError::InvalidExpression { .. }) => {
                warn!(subscription_id = %subscription.id, %error, "filter evaluation failed");
                return Ok(Some(DeliveryResult::not_attempted(
                    subscription.id,
                    &subscription.name,
                    SubscriptionError::Filter(error.to_string()),
                )));
            },
        }

        let body = match serde_json::to_vec(&payload) {
            Ok(body) => Bytes::from(body),
            Err(error) => {
                return Ok(Some(DeliveryResult::not_attempted(
                    subscription.id,
                    &subscription.name,
                    SubscriptionError::Factory(format!("payload serialization failed: {error}")),
                )));
            },
        };

        let payload = match &subscription.secret {
            Some(secret) => {
                let signature = signature::sign(&body, secret, self.config.signature_encoding);
                SignedPayload::signed(body, signature)
            },
            None => SignedPayload::unsigned(body),
        };

        Ok(Some(self.sender.deliver_with_retry(subscription, &payload, event_id, cancel).await))
    }
}
