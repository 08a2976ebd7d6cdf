//! End-to-end notification cycle tests.
//!
//! Drives the notifier against the in-memory store and mock HTTP endpoints:
//! event-type selection, filter gating, partial failure isolation, signing
//! on the wire, cancellation, and tenant scoping.

use std::{sync::Arc, time::Duration};

use serde_json::json;
use signet_core::{
    EventInfo, EventNotification, MemoryStoreProvider, MemorySubscriptionStore, SubscriptionStore,
    TenantId, WebhookFilter, WebhookSubscription, WebhookSubscriptionInfo,
};
use signet_notify::{
    verify, DefaultWebhookFactory, EventWebhook, FactoryError, FnWebhookFactory, Notifier,
    NotifierConfig, NotifyError, RetryPolicy, SubscriptionError,
};
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

fn fast_config() -> NotifierConfig {
    NotifierConfig {
        retry: RetryPolicy::fixed(Duration::from_millis(10)),
        request_timeout: Duration::from_millis(500),
        default_retry_count: 0,
        ..NotifierConfig::default()
    }
}

fn notifier(store: Arc<MemorySubscriptionStore>) -> Notifier<EventWebhook> {
    Notifier::new(store, Arc::new(DefaultWebhookFactory), fast_config()).unwrap()
}

fn descriptor(name: &str, event_type: &str, url: &str) -> WebhookSubscriptionInfo {
    WebhookSubscriptionInfo::new(name, Url::parse(url).unwrap()).with_event_type(event_type)
}

async fn ok_endpoint() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).mount(&server).await;
    server
}

#[tokio::test]
async fn only_interested_subscriptions_are_notified() {
    let created_endpoint = ok_endpoint().await;
    let deleted_endpoint = ok_endpoint().await;

    let store = Arc::new(MemorySubscriptionStore::new());
    let created = store
        .create(descriptor("created", "user.created", &created_endpoint.uri()))
        .await
        .unwrap();
    store.create(descriptor("deleted", "user.deleted", &deleted_endpoint.uri())).await.unwrap();

    let result = notifier(store)
        .notify(
            EventInfo::new("user", "user.created", json!({"id": 7})),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.matched(), 1);
    assert_eq!(result.successes(), 1);
    assert_eq!(result.results[0].subscription_id, created.id);

    assert_eq!(created_endpoint.received_requests().await.unwrap().len(), 1);
    assert!(deleted_endpoint.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn filters_gate_delivery_on_payload_fields() {
    let endpoint = ok_endpoint().await;

    let store = Arc::new(MemorySubscriptionStore::new());
    store
        .create(
            descriptor("filtered", "user.created", &endpoint.uri())
                .with_filter(WebhookFilter::new("linq", r#"foo == "bar""#)),
        )
        .await
        .unwrap();
    let notifier = notifier(store);

    let matched = notifier
        .notify(
            EventInfo::new("user", "user.created", json!({"foo": "bar"})),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(matched.successes(), 1);

    // A non-matching payload is skipped entirely, not recorded as failed.
    let skipped = notifier
        .notify(
            EventInfo::new("user", "user.created", json!({"foo": "baz"})),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(skipped.is_empty());

    assert_eq!(endpoint.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn zero_matches_is_an_empty_result_not_an_error() {
    let store = Arc::new(MemorySubscriptionStore::new());

    let result = notifier(store)
        .notify(EventInfo::new("user", "user.created", json!({})), &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.is_empty());
    assert_eq!(result.matched(), 0);
}

#[tokio::test]
async fn store_outage_fails_the_whole_call() {
    let store = Arc::new(MemorySubscriptionStore::new());
    store.inject_error("backend down").await;

    let error = notifier(store)
        .notify(EventInfo::new("user", "user.created", json!({})), &CancellationToken::new())
        .await
        .expect_err("store down");
    assert!(matches!(error, NotifyError::Store(_)));
}

#[tokio::test]
async fn factory_failure_is_isolated_to_one_subscription() {
    let endpoint = ok_endpoint().await;

    let store = Arc::new(MemorySubscriptionStore::new());
    store.create(descriptor("healthy", "user.created", &endpoint.uri())).await.unwrap();
    let doomed =
        store.create(descriptor("doomed", "user.created", &endpoint.uri())).await.unwrap();

    let factory = FnWebhookFactory::new(
        move |sub: &WebhookSubscription, notification: &EventNotification| {
            if sub.name == "doomed" {
                return Err(FactoryError::new("enrichment lookup failed"));
            }
            let event = notification
                .single()
                .map_err(|e| FactoryError::with_source("single event required", e))?;
            Ok(json!({"event_name": event.event_type}))
        },
    );
    let notifier: Notifier<serde_json::Value> =
        Notifier::new(store, Arc::new(factory), fast_config()).unwrap();

    let result = notifier
        .notify(EventInfo::new("user", "user.created", json!({})), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.matched(), 2);
    assert_eq!(result.successes(), 1);
    assert_eq!(result.failures(), 1);

    let failed = result.results.iter().find(|r| r.subscription_id == doomed.id).unwrap();
    assert_eq!(failed.attempts_used, 0);
    assert!(matches!(failed.error, Some(SubscriptionError::Factory(_))));
}

#[tokio::test]
async fn unsupported_filter_format_fails_the_call() {
    let endpoint = ok_endpoint().await;

    let store = Arc::new(MemorySubscriptionStore::new());
    store
        .create(
            descriptor("misconfigured", "user.created", &endpoint.uri())
                .with_filter(WebhookFilter::new("xpath", "/user/plan")),
        )
        .await
        .unwrap();

    let error = notifier(store)
        .notify(EventInfo::new("user", "user.created", json!({})), &CancellationToken::new())
        .await
        .expect_err("no xpath evaluator registered");
    assert!(matches!(error, NotifyError::UnsupportedFilterFormat { format } if format == "xpath"));
}

#[tokio::test]
async fn malformed_expression_fails_only_its_subscription() {
    let endpoint = ok_endpoint().await;

    let store = Arc::new(MemorySubscriptionStore::new());
    store.create(descriptor("healthy", "user.created", &endpoint.uri())).await.unwrap();
    let broken = store
        .create(
            descriptor("broken", "user.created", &endpoint.uri())
                .with_filter(WebhookFilter::new("linq", "foo ==")),
        )
        .await
        .unwrap();

    let result = notifier(store)
        .notify(EventInfo::new("user", "user.created", json!({})), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.successes(), 1);
    let failed = result.results.iter().find(|r| r.subscription_id == broken.id).unwrap();
    assert_eq!(failed.attempts_used, 0);
    assert!(matches!(failed.error, Some(SubscriptionError::Filter(_))));
}

#[tokio::test]
async fn slow_subscriber_does_not_block_the_fast_one() {
    let slow_endpoint = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&slow_endpoint)
        .await;
    let fast_endpoint = ok_endpoint().await;

    let store = Arc::new(MemorySubscriptionStore::new());
    let slow = store.create(descriptor("slow", "user.created", &slow_endpoint.uri())).await.unwrap();
    store.create(descriptor("fast", "user.created", &fast_endpoint.uri())).await.unwrap();

    let config = NotifierConfig { request_timeout: Duration::from_millis(300), ..fast_config() };
    let notifier: Notifier<EventWebhook> =
        Notifier::new(store, Arc::new(DefaultWebhookFactory), config).unwrap();

    let started = std::time::Instant::now();
    let result = notifier
        .notify(EventInfo::new("user", "user.created", json!({})), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.successes(), 1);
    assert_eq!(result.failures(), 1);
    let failed = result.results.iter().find(|r| !r.succeeded).unwrap();
    assert_eq!(failed.subscription_id, slow.id);

    // The cycle is bounded by the slow subscriber's own timeout, not its
    // 5s response delay.
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn delivered_signature_verifies_over_received_body() {
    let endpoint = ok_endpoint().await;

    let store = Arc::new(MemorySubscriptionStore::new());
    store
        .create(
            descriptor("signed", "user.created", &endpoint.uri()).with_secret("shared-secret"),
        )
        .await
        .unwrap();

    let result = notifier(store)
        .notify(
            EventInfo::new("user", "user.created", json!({"foo": "bar"})),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(result.successes(), 1);

    let received = &endpoint.received_requests().await.unwrap()[0];
    let signature =
        received.headers.get("X-WEBHOOK-SIGNATURE").unwrap().to_str().unwrap().to_string();

    assert!(verify(&received.body, &signature, "shared-secret"));
    assert!(!verify(&received.body, &signature, "other-secret"));

    // The body is the webhook wire shape the filters see.
    let wire: serde_json::Value = serde_json::from_slice(&received.body).unwrap();
    assert_eq!(wire["event_name"], "user.created");
    assert_eq!(wire["foo"], "bar");
}

#[tokio::test]
async fn unsigned_subscription_gets_no_signature_header() {
    let endpoint = ok_endpoint().await;

    let store = Arc::new(MemorySubscriptionStore::new());
    store.create(descriptor("unsigned", "user.created", &endpoint.uri())).await.unwrap();

    notifier(store)
        .notify(EventInfo::new("user", "user.created", json!({})), &CancellationToken::new())
        .await
        .unwrap();

    let received = &endpoint.received_requests().await.unwrap()[0];
    assert!(received.headers.get("X-WEBHOOK-SIGNATURE").is_none());
}

#[tokio::test]
async fn cancelled_cycle_starts_no_deliveries() {
    let endpoint = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&endpoint)
        .await;

    let store = Arc::new(MemorySubscriptionStore::new());
    store.create(descriptor("a", "user.created", &endpoint.uri())).await.unwrap();
    store.create(descriptor("b", "user.created", &endpoint.uri())).await.unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = notifier(store)
        .notify(EventInfo::new("user", "user.created", json!({})), &cancel)
        .await
        .unwrap();

    assert!(result.is_empty());
}

#[tokio::test]
async fn notification_timeout_stops_later_subscriptions() {
    let endpoint = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(400)))
        .mount(&endpoint)
        .await;

    let store = Arc::new(MemorySubscriptionStore::new());
    for name in ["first", "second", "third"] {
        store
            .create(descriptor(name, "user.created", &format!("{}/hook", endpoint.uri())))
            .await
            .unwrap();
    }

    // One delivery at a time; the cycle deadline fires while the first is
    // still in flight, so the rest never start.
    let config = NotifierConfig {
        max_concurrent_deliveries: 1,
        notification_timeout: Some(Duration::from_millis(100)),
        request_timeout: Duration::from_secs(2),
        ..fast_config()
    };
    let notifier: Notifier<EventWebhook> =
        Notifier::new(store, Arc::new(DefaultWebhookFactory), config).unwrap();

    let result = notifier
        .notify(EventInfo::new("user", "user.created", json!({})), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.matched(), 1);
    assert_eq!(result.successes(), 1);
    assert_eq!(endpoint.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn tenant_scoped_notification_uses_the_tenant_store() {
    let endpoint = ok_endpoint().await;

    let provider = Arc::new(MemoryStoreProvider::new());
    let tenant_a = TenantId::new();
    let tenant_b = TenantId::new();
    provider
        .tenant_store(tenant_a)
        .await
        .create(descriptor("tenant-a", "user.created", &endpoint.uri()))
        .await
        .unwrap();

    let notifier: Notifier<EventWebhook> = Notifier::new(
        Arc::new(MemorySubscriptionStore::new()),
        Arc::new(DefaultWebhookFactory),
        fast_config(),
    )
    .unwrap()
    .with_store_provider(provider);

    let event = EventInfo::new("user", "user.created", json!({}));
    let delivered =
        notifier.notify_tenant(tenant_a, event.clone(), &CancellationToken::new()).await.unwrap();
    assert_eq!(delivered.successes(), 1);

    let other =
        notifier.notify_tenant(tenant_b, event, &CancellationToken::new()).await.unwrap();
    assert!(other.is_empty());
}

#[tokio::test]
async fn tenant_notification_without_provider_is_an_error() {
    let store = Arc::new(MemorySubscriptionStore::new());

    let error = notifier(store)
        .notify_tenant(
            TenantId::new(),
            EventInfo::new("user", "user.created", json!({})),
            &CancellationToken::new(),
        )
        .await
        .expect_err("no provider configured");
    assert!(matches!(error, NotifyError::MissingStoreProvider));
}
