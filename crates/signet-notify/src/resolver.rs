//! Subscription resolution for a notification cycle.
//!
//! The resolver owns the selection contract: only active subscriptions
//! declaring exact-string interest in the event type are candidates. The
//! actual lookup is delegated to the store; when the store cannot be read
//! the whole cycle fails fast with nothing delivered.

use std::sync::Arc;

use signet_core::{SubscriptionStore, SubscriptionStoreProvider, TenantId, WebhookSubscription};

use crate::error::{NotifyError, Result};

/// Resolves the subscriptions interested in an event type.
///
/// Holds the deployment's default store and, for multi-tenant deployments,
/// an optional provider of per-tenant stores. The tenant is always an
/// explicit parameter; there is no ambient tenant context.
#[derive(Clone)]
pub struct SubscriptionResolver {
    store: Arc<dyn SubscriptionStore>,
    provider: Option<Arc<dyn SubscriptionStoreProvider>>,
}

impl SubscriptionResolver {
    /// Creates a resolver over the given store.
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self { store, provider: None }
    }

    /// Adds a per-tenant store provider for tenant-scoped resolution.
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn SubscriptionStoreProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Returns the active subscriptions interested in `event_type`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Store`] when the backing store cannot be
    /// read.
    pub async fn resolve(&self, event_type: &str) -> Result<Vec<WebhookSubscription>> {
        Self::select(self.store.as_ref(), event_type).await
    }

    /// Returns the given tenant's active subscriptions interested in
    /// `event_type`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::MissingStoreProvider`] when no provider is
    /// configured, or [`NotifyError::Store`] when the tenant's store cannot
    /// be read.
    pub async fn resolve_tenant(
        &self,
        tenant_id: TenantId,
        event_type: &str,
    ) -> Result<Vec<WebhookSubscription>> {
        let provider = self.provider.as_ref().ok_or(NotifyError::MissingStoreProvider)?;
        let store = provider.store_for(tenant_id).await?;
        Self::select(store.as_ref(), event_type).await
    }

    /// Applies the selection predicate regardless of what the store
    /// returned: active-only, exact event-type membership.
    async fn select(
        store: &dyn SubscriptionStore,
        event_type: &str,
    ) -> Result<Vec<WebhookSubscription>> {
        let mut subscriptions = store.find_by_event_type(event_type, true).await?;
        subscriptions.retain(|s| s.is_active && s.listens_to(event_type));
        Ok(subscriptions)
    }
}
