//! Integration tests for the in-memory subscription store.
//!
//! Exercises the store contract through the trait object, the way the
//! notification pipeline consumes it: active-only resolution, state
//! transitions, pagination, metadata lookup, and failure injection.

use std::sync::Arc;

use signet_core::{
    CoreError, MemoryStoreProvider, MemorySubscriptionStore, SubscriptionId, SubscriptionStore,
    SubscriptionStoreProvider, TenantId, WebhookSubscriptionInfo,
};
use url::Url;

fn descriptor(name: &str, event_type: &str) -> WebhookSubscriptionInfo {
    WebhookSubscriptionInfo::new(name, Url::parse("https://example.com/hooks").unwrap())
        .with_event_type(event_type)
}

#[tokio::test]
async fn created_subscription_is_retrievable() {
    let store = MemorySubscriptionStore::new();

    let created = store.create(descriptor("orders", "order.created")).await.unwrap();
    let found = store.find_by_id(created.id).await.unwrap().expect("stored subscription");

    assert_eq!(found.name, "orders");
    assert!(found.is_active);
    assert_eq!(store.count_all().await.unwrap(), 1);
}

#[tokio::test]
async fn find_by_id_returns_none_for_unknown() {
    let store = MemorySubscriptionStore::new();
    assert!(store.find_by_id(SubscriptionId::new()).await.unwrap().is_none());
}

#[tokio::test]
async fn inactive_subscriptions_excluded_from_active_lookup() {
    let store = MemorySubscriptionStore::new();

    let active = store.create(descriptor("a", "user.created")).await.unwrap();
    let inactive = store.create(descriptor("b", "user.created")).await.unwrap();
    store.set_active(inactive.id, false).await.unwrap();

    let resolved = store.find_by_event_type("user.created", true).await.unwrap();
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].id, active.id);

    // Without the active-only gate both are visible.
    let all = store.find_by_event_type("user.created", false).await.unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn reactivated_subscription_resolves_again() {
    let store = MemorySubscriptionStore::new();

    let sub = store.create(descriptor("a", "user.created")).await.unwrap();
    store.set_active(sub.id, false).await.unwrap();
    assert!(store.find_by_event_type("user.created", true).await.unwrap().is_empty());

    store.set_active(sub.id, true).await.unwrap();
    assert_eq!(store.find_by_event_type("user.created", true).await.unwrap().len(), 1);
}

#[tokio::test]
async fn event_type_lookup_is_exact() {
    let store = MemorySubscriptionStore::new();
    store.create(descriptor("a", "user.created")).await.unwrap();

    assert!(store.find_by_event_type("user", true).await.unwrap().is_empty());
    assert!(store.find_by_event_type("user.created.v2", true).await.unwrap().is_empty());
    assert_eq!(store.find_by_event_type("user.created", true).await.unwrap().len(), 1);
}

#[tokio::test]
async fn update_refreshes_timestamp_and_requires_existing() {
    let store = MemorySubscriptionStore::new();

    let mut sub = store.create(descriptor("a", "user.created")).await.unwrap();
    let created_updated_at = sub.updated_at;
    sub.name = "renamed".to_string();

    let updated = store.update(sub.clone()).await.unwrap();
    assert_eq!(updated.name, "renamed");
    assert!(updated.updated_at >= created_updated_at);

    store.delete(sub.id).await.unwrap();
    let error = store.update(sub).await.expect_err("deleted subscription");
    assert!(matches!(error, CoreError::NotFound(_)));
}

#[tokio::test]
async fn delete_reports_existence() {
    let store = MemorySubscriptionStore::new();
    let sub = store.create(descriptor("a", "user.created")).await.unwrap();

    assert!(store.delete(sub.id).await.unwrap());
    assert!(!store.delete(sub.id).await.unwrap());
    assert_eq!(store.count_all().await.unwrap(), 0);
}

#[tokio::test]
async fn pagination_is_stable() {
    let store = MemorySubscriptionStore::new();
    for i in 0..5 {
        store.create(descriptor(&format!("sub-{i}"), "user.created")).await.unwrap();
    }

    let first = store.list_page(0, 2).await.unwrap();
    let second = store.list_page(2, 2).await.unwrap();
    let third = store.list_page(4, 2).await.unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 2);
    assert_eq!(third.len(), 1);

    let mut seen: Vec<SubscriptionId> = Vec::new();
    for page in [first, second, third] {
        for sub in page {
            assert!(!seen.contains(&sub.id), "pages must not overlap");
            seen.push(sub.id);
        }
    }
    assert_eq!(seen.len(), 5);
}

#[tokio::test]
async fn metadata_lookup_matches_key_and_value() {
    let store = MemorySubscriptionStore::new();
    store
        .create(descriptor("a", "user.created").with_metadata("team", "billing"))
        .await
        .unwrap();
    store
        .create(descriptor("b", "user.created").with_metadata("team", "growth"))
        .await
        .unwrap();

    let billing = store.find_by_metadata("team", "billing").await.unwrap();
    assert_eq!(billing.len(), 1);
    assert_eq!(billing[0].name, "a");

    assert!(store.find_by_metadata("team", "absent").await.unwrap().is_empty());
    assert!(store.find_by_metadata("owner", "billing").await.unwrap().is_empty());
}

#[tokio::test]
async fn injected_error_surfaces_as_store_unavailable() {
    let store = MemorySubscriptionStore::new();
    store.create(descriptor("a", "user.created")).await.unwrap();

    store.inject_error("simulated outage").await;
    let error = store.find_by_event_type("user.created", true).await.expect_err("injected");
    assert!(matches!(error, CoreError::StoreUnavailable(_)));

    // The injection is one-shot; the store recovers afterwards.
    assert_eq!(store.find_by_event_type("user.created", true).await.unwrap().len(), 1);
}

#[tokio::test]
async fn provider_isolates_tenants() {
    let provider = MemoryStoreProvider::new();
    let tenant_a = TenantId::new();
    let tenant_b = TenantId::new();

    let store_a = provider.store_for(tenant_a).await.unwrap();
    store_a.create(descriptor("a", "user.created")).await.unwrap();

    let store_b = provider.store_for(tenant_b).await.unwrap();
    assert_eq!(store_b.count_all().await.unwrap(), 0);
    assert_eq!(store_a.count_all().await.unwrap(), 1);

    // The same tenant maps to the same underlying store.
    let store_a_again = provider.store_for(tenant_a).await.unwrap();
    assert_eq!(store_a_again.count_all().await.unwrap(), 1);
}

#[tokio::test]
async fn store_contract_is_object_safe() {
    let store: Arc<dyn SubscriptionStore> = Arc::new(MemorySubscriptionStore::new());
    let sub = store.create(descriptor("a", "user.created")).await.unwrap();
    assert!(store.find_by_id(sub.id).await.unwrap().is_some());
}
