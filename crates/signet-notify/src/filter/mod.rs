//! Filter evaluation deciding which subscriptions receive an event.
//!
//! A subscription's filters are boolean predicates over the webhook
//! payload's JSON serialization, so expressions reference fields exactly as
//! they appear on the wire (`event_name`, `foo`, ...). Each filter names a
//! format; the [`FilterRegistry`] dispatches to the registered evaluator
//! for that format. The wildcard expression `"*"` matches everything
//! without consulting any evaluator, and an empty filter list is
//! equivalent to a single wildcard.

mod expr;
mod path;

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;

use signet_core::{WebhookFilter, WebhookSubscription};

use crate::error::FilterError;

pub use expr::ExprEvaluator;
pub use path::PathEvaluator;

/// Evaluates expressions of one filter format against webhook payloads.
///
/// Implementations are registered in a [`FilterRegistry`] under their
/// format name. Evaluation is asynchronous-capable because some formats may
/// need to consult external state; the bundled evaluators are pure.
#[async_trait]
pub trait FilterEvaluator: Send + Sync {
    /// Format name this evaluator handles, e.g. `"linq"`.
    fn format(&self) -> &str;

    /// Evaluates `expression` as a boolean predicate over `payload`.
    ///
    /// Missing payload fields evaluate as absent, never as errors; an
    /// empty or default payload must not fail.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvalidExpression`] when the expression is
    /// malformed for this format.
    async fn matches(&self, expression: &str, payload: &Value) -> Result<bool, FilterError>;
}

/// Registry mapping filter format names to evaluators.
#[derive(Clone, Default)]
pub struct FilterRegistry {
    evaluators: HashMap<String, Arc<dyn FilterEvaluator>>,
}

impl FilterRegistry {
    /// Creates an empty registry.
    ///
    /// Only wildcard filters match against an empty registry; any named
    /// format is a configuration error.
    pub fn new() -> Self {
        Self { evaluators: HashMap::new() }
    }

    /// Creates a registry with the bundled evaluators registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ExprEvaluator));
        registry.register(Arc::new(PathEvaluator));
        registry
    }

    /// Registers an evaluator under its format name.
    ///
    /// A later registration for the same format replaces the earlier one.
    pub fn register(&mut self, evaluator: Arc<dyn FilterEvaluator>) {
        self.evaluators.insert(evaluator.format().to_string(), evaluator);
    }

    /// Returns the registered format names.
    pub fn formats(&self) -> impl Iterator<Item = &str> {
        self.evaluators.keys().map(String::as_str)
    }

    /// Evaluates a single filter against a payload.
    ///
    /// The wildcard expression matches immediately, regardless of format
    /// and even for formats with no registered evaluator.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::UnsupportedFormat`] when no evaluator is
    /// registered for a non-wildcard filter's format.
    pub async fn filter_matches(
        &self,
        filter: &WebhookFilter,
        payload: &Value,
    ) -> Result<bool, FilterError> {
        if filter.is_wildcard() {
            return Ok(true);
        }

        let evaluator = self
            .evaluators
            .get(&filter.format)
            .ok_or_else(|| FilterError::unsupported(&filter.format))?;
        evaluator.matches(&filter.expression, payload).await
    }

    /// Whether a subscription's filter list matches a payload.
    ///
    /// Logical OR across the ordered filter list; an empty list matches
    /// everything. Evaluation stops at the first match, so an unsupported
    /// format later in the list is only surfaced when reached.
    pub async fn subscription_matches(
        &self,
        subscription: &WebhookSubscription,
        payload: &Value,
    ) -> Result<bool, FilterError> {
        if subscription.filters.is_empty() {
            return Ok(true);
        }

        for filter in &subscription.filters {
            if self.filter_matches(filter, payload).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use signet_core::{SubscriptionId, WebhookSubscription, WebhookSubscriptionInfo};
    use url::Url;

    use super::*;

    fn subscription(filters: Vec<WebhookFilter>) -> WebhookSubscription {
        let mut info = WebhookSubscriptionInfo::new(
            "test",
            Url::parse("https://example.com/hooks").unwrap(),
        )
        .with_event_type("user.created");
        info.filters = filters;
        WebhookSubscription::from_info(SubscriptionId::new(), info)
    }

    #[tokio::test]
    async fn empty_filter_list_matches_everything() {
        let registry = FilterRegistry::with_defaults();
        let sub = subscription(Vec::new());

        assert!(registry.subscription_matches(&sub, &json!({})).await.unwrap());
        assert!(registry.subscription_matches(&sub, &json!({"a": 1})).await.unwrap());
    }

    #[tokio::test]
    async fn wildcard_matches_under_unknown_format() {
        let registry = FilterRegistry::new();
        let filter = WebhookFilter::new("no-such-format", "*");

        assert!(registry.filter_matches(&filter, &json!({})).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_format_is_an_error_not_a_no_match() {
        let registry = FilterRegistry::with_defaults();
        let filter = WebhookFilter::new("xpath", "/a/b");

        let error = registry.filter_matches(&filter, &json!({})).await.expect_err("unsupported");
        assert!(matches!(error, FilterError::UnsupportedFormat { .. }));
    }

    #[tokio::test]
    async fn any_filter_matching_is_enough() {
        let registry = FilterRegistry::with_defaults();
        let sub = subscription(vec![
            WebhookFilter::new("linq", "foo == \"nope\""),
            WebhookFilter::new("linq", "foo == \"bar\""),
        ]);

        assert!(registry.subscription_matches(&sub, &json!({"foo": "bar"})).await.unwrap());
        assert!(!registry.subscription_matches(&sub, &json!({"foo": "baz"})).await.unwrap());
    }

    #[tokio::test]
    async fn later_registration_replaces_earlier() {
        let mut registry = FilterRegistry::with_defaults();
        registry.register(Arc::new(ExprEvaluator));
        assert_eq!(registry.formats().filter(|f| *f == "linq").count(), 1);
    }
}
