//! Subscription store contract and in-memory reference implementation.
//!
//! Persistence is an external collaborator: deployments implement
//! [`SubscriptionStore`] over their document or key-value backend, and the
//! notification pipeline consumes only this contract. The bundled
//! [`MemorySubscriptionStore`] backs embedded deployments and tests, and
//! supports failure injection for exercising store-outage paths.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    error::{CoreError, Result},
    models::{SubscriptionId, TenantId, WebhookSubscription, WebhookSubscriptionInfo},
};

/// Storage operations required for webhook subscriptions.
///
/// The notification pipeline reads through this trait during resolution;
/// management surfaces use the write operations. Implementations map their
/// backend failures to [`CoreError::StoreUnavailable`] so callers can
/// distinguish outages from empty results.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Creates a subscription from its descriptor, assigning the ID.
    ///
    /// New subscriptions start active. Fails with
    /// [`CoreError::InvalidInput`] when the descriptor is invalid.
    async fn create(&self, info: WebhookSubscriptionInfo) -> Result<WebhookSubscription>;

    /// Finds a subscription by ID, `None` when absent.
    async fn find_by_id(&self, id: SubscriptionId) -> Result<Option<WebhookSubscription>>;

    /// Finds subscriptions declaring interest in the given event type.
    ///
    /// Event-type matching is exact-string membership. With `active_only`,
    /// inactive subscriptions are excluded; this is the form the resolver
    /// uses.
    async fn find_by_event_type(
        &self,
        event_type: &str,
        active_only: bool,
    ) -> Result<Vec<WebhookSubscription>>;

    /// Replaces a subscription's stored state.
    ///
    /// Fails with [`CoreError::NotFound`] when the ID is unknown. Returns
    /// the stored value with `updated_at` refreshed.
    async fn update(&self, subscription: WebhookSubscription) -> Result<WebhookSubscription>;

    /// Deletes a subscription; returns whether it existed.
    async fn delete(&self, id: SubscriptionId) -> Result<bool>;

    /// Activates or deactivates a subscription.
    ///
    /// Deactivated subscriptions are never matched by resolution until
    /// reactivated.
    async fn set_active(&self, id: SubscriptionId, active: bool) -> Result<()>;

    /// Counts all stored subscriptions.
    async fn count_all(&self) -> Result<u64>;

    /// Returns a stable page of subscriptions ordered by creation time.
    async fn list_page(&self, offset: u64, limit: u64) -> Result<Vec<WebhookSubscription>>;

    /// Finds subscriptions annotated with the given metadata key and value.
    async fn find_by_metadata(&self, key: &str, value: &str) -> Result<Vec<WebhookSubscription>>;
}

/// Provider of per-tenant subscription stores.
///
/// Multi-tenant deployments partition subscriptions per tenant; the
/// resolver threads an explicit tenant ID through this provider rather
/// than relying on ambient context.
#[async_trait]
pub trait SubscriptionStoreProvider: Send + Sync {
    /// Returns the store holding the given tenant's subscriptions.
    async fn store_for(&self, tenant_id: TenantId) -> Result<Arc<dyn SubscriptionStore>>;
}

/// In-memory subscription store.
///
/// Backs embedded deployments and tests. Data lives in a `RwLock`-guarded
/// map; pagination is ordered by creation time then ID for determinism.
/// `inject_error` makes the next operation fail, for exercising the
/// pipeline's store-outage handling.
pub struct MemorySubscriptionStore {
    subscriptions: RwLock<HashMap<SubscriptionId, WebhookSubscription>>,
    next_error: RwLock<Option<String>>,
}

impl MemorySubscriptionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self { subscriptions: RwLock::new(HashMap::new()), next_error: RwLock::new(None) }
    }

    /// Makes the next store operation fail with `StoreUnavailable`.
    pub async fn inject_error(&self, message: impl Into<String>) {
        *self.next_error.write().await = Some(message.into());
    }

    async fn take_injected_error(&self) -> Result<()> {
        if let Some(message) = self.next_error.write().await.take() {
            return Err(CoreError::StoreUnavailable(message));
        }
        Ok(())
    }
}

impl Default for MemorySubscriptionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn create(&self, info: WebhookSubscriptionInfo) -> Result<WebhookSubscription> {
        self.take_injected_error().await?;
        info.validate()?;

        let subscription = WebhookSubscription::from_info(SubscriptionId::new(), info);
        self.subscriptions.write().await.insert(subscription.id, subscription.clone());
        Ok(subscription)
    }

    async fn find_by_id(&self, id: SubscriptionId) -> Result<Option<WebhookSubscription>> {
        self.take_injected_error().await?;
        Ok(self.subscriptions.read().await.get(&id).cloned())
    }

    async fn find_by_event_type(
        &self,
        event_type: &str,
        active_only: bool,
    ) -> Result<Vec<WebhookSubscription>> {
        self.take_injected_error().await?;

        let subscriptions = self.subscriptions.read().await;
        let mut matched: Vec<WebhookSubscription> = subscriptions
            .values()
            .filter(|s| s.listens_to(event_type) && (!active_only || s.is_active))
            .cloned()
            .collect();
        matched.sort_by(|a, b| (a.created_at, a.id.0).cmp(&(b.created_at, b.id.0)));
        Ok(matched)
    }

    async fn update(&self, mut subscription: WebhookSubscription) -> Result<WebhookSubscription> {
        self.take_injected_error().await?;

        let mut subscriptions = self.subscriptions.write().await;
        if !subscriptions.contains_key(&subscription.id) {
            return Err(CoreError::not_found(format!("subscription {}", subscription.id)));
        }
        subscription.updated_at = chrono::Utc::now();
        subscriptions.insert(subscription.id, subscription.clone());
        Ok(subscription)
    }

    async fn delete(&self, id: SubscriptionId) -> Result<bool> {
        self.take_injected_error().await?;
        Ok(self.subscriptions.write().await.remove(&id).is_some())
    }

    async fn set_active(&self, id: SubscriptionId, active: bool) -> Result<()> {
        self.take_injected_error().await?;

        let mut subscriptions = self.subscriptions.write().await;
        let subscription = subscriptions
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found(format!("subscription {id}")))?;
        subscription.is_active = active;
        subscription.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn count_all(&self) -> Result<u64> {
        self.take_injected_error().await?;
        Ok(self.subscriptions.read().await.len() as u64)
    }

    async fn list_page(&self, offset: u64, limit: u64) -> Result<Vec<WebhookSubscription>> {
        self.take_injected_error().await?;

        let subscriptions = self.subscriptions.read().await;
        let mut all: Vec<WebhookSubscription> = subscriptions.values().cloned().collect();
        all.sort_by(|a, b| (a.created_at, a.id.0).cmp(&(b.created_at, b.id.0)));
        Ok(all
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .collect())
    }

    async fn find_by_metadata(&self, key: &str, value: &str) -> Result<Vec<WebhookSubscription>> {
        self.take_injected_error().await?;

        let subscriptions = self.subscriptions.read().await;
        let mut matched: Vec<WebhookSubscription> = subscriptions
            .values()
            .filter(|s| s.metadata.get(key).is_some_and(|v| v == value))
            .cloned()
            .collect();
        matched.sort_by(|a, b| (a.created_at, a.id.0).cmp(&(b.created_at, b.id.0)));
        Ok(matched)
    }
}

/// In-memory provider that lazily provisions one store per tenant.
pub struct MemoryStoreProvider {
    stores: RwLock<HashMap<TenantId, Arc<MemorySubscriptionStore>>>,
}

impl MemoryStoreProvider {
    /// Creates a provider with no tenant stores.
    pub fn new() -> Self {
        Self { stores: RwLock::new(HashMap::new()) }
    }

    /// Returns the concrete store for a tenant, creating it on first use.
    ///
    /// Useful in tests that need to seed a tenant's subscriptions before
    /// notifying.
    pub async fn tenant_store(&self, tenant_id: TenantId) -> Arc<MemorySubscriptionStore> {
        let mut stores = self.stores.write().await;
        stores.entry(tenant_id).or_insert_with(|| Arc::new(MemorySubscriptionStore::new())).clone()
    }
}

impl Default for MemoryStoreProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubscriptionStoreProvider for MemoryStoreProvider {
    async fn store_for(&self, tenant_id: TenantId) -> Result<Arc<dyn SubscriptionStore>> {
        Ok(self.tenant_store(tenant_id).await as Arc<dyn SubscriptionStore>)
    }
}
