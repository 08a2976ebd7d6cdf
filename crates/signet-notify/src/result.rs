//! Delivery outcomes recorded during a notification cycle.
//!
//! Each subscription produces one [`DeliveryResult`] carrying every
//! [`DeliveryAttempt`] made against it; the cycle aggregates them into a
//! [`NotificationResult`]. Partial success is the normal case: callers
//! inspect individual results rather than receiving an error per failed
//! subscriber.

use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use signet_core::{EventId, SubscriptionId};

use crate::error::{DeliveryError, SubscriptionError};

/// One HTTP delivery try against a subscription's destination.
#[derive(Debug, Clone)]
pub struct DeliveryAttempt {
    /// Subscription this attempt targeted.
    pub subscription_id: SubscriptionId,

    /// 1-based attempt number within the subscription's retry budget.
    pub attempt_number: u32,

    /// HTTP status code, when a response was received at all.
    pub status: Option<u16>,

    /// Classified failure, absent on success.
    pub error: Option<DeliveryError>,

    /// When the attempt started.
    pub started_at: DateTime<Utc>,

    /// How long the attempt took, including reading the response.
    pub duration: Duration,
}

impl DeliveryAttempt {
    /// Whether this attempt received a success-class response.
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.status.is_some_and(|s| (200..300).contains(&s))
    }
}

/// Final outcome for one subscription in a notification cycle.
///
/// The last attempt's outcome determines `succeeded`; earlier attempts are
/// retained for diagnostics. Subscriptions whose filters did not match
/// produce no result at all.
#[derive(Debug, Clone)]
pub struct DeliveryResult {
    /// Subscription this result belongs to.
    pub subscription_id: SubscriptionId,

    /// Subscription name at the time of the cycle, for log correlation.
    pub subscription_name: String,

    /// Whether the payload was delivered.
    pub succeeded: bool,

    /// Attempts actually made; zero when the payload was never sent
    /// (factory or filter failure).
    pub attempts_used: u32,

    /// Every attempt made, in order.
    pub attempts: Vec<DeliveryAttempt>,

    /// Classified failure when `succeeded` is false.
    pub error: Option<SubscriptionError>,
}

impl DeliveryResult {
    /// Records a successful delivery.
    pub fn success(
        subscription_id: SubscriptionId,
        subscription_name: impl Into<String>,
        attempts: Vec<DeliveryAttempt>,
    ) -> Self {
        Self {
            subscription_id,
            subscription_name: subscription_name.into(),
            succeeded: true,
            attempts_used: attempts.len() as u32,
            attempts,
            error: None,
        }
    }

    /// Records a delivery that failed after the recorded attempts.
    pub fn failure(
        subscription_id: SubscriptionId,
        subscription_name: impl Into<String>,
        attempts: Vec<DeliveryAttempt>,
        error: SubscriptionError,
    ) -> Self {
        Self {
            subscription_id,
            subscription_name: subscription_name.into(),
            succeeded: false,
            attempts_used: attempts.len() as u32,
            attempts,
            error: Some(error),
        }
    }

    /// Records a failure before any attempt was made (factory or filter
    /// evaluation failed for this subscription).
    pub fn not_attempted(
        subscription_id: SubscriptionId,
        subscription_name: impl Into<String>,
        error: SubscriptionError,
    ) -> Self {
        Self::failure(subscription_id, subscription_name, Vec::new(), error)
    }
}

/// Aggregate outcome of one notification cycle.
#[derive(Debug, Clone)]
pub struct NotificationResult {
    /// Identifier of this cycle, shared by its delivery log entries.
    pub notification_id: Uuid,

    /// Event that triggered the cycle.
    pub event_id: EventId,

    /// Per-subscription outcomes, one per matched subscription.
    pub results: Vec<DeliveryResult>,
}

impl NotificationResult {
    /// Creates a result for a cycle that matched the given subscriptions.
    pub fn new(event_id: EventId, results: Vec<DeliveryResult>) -> Self {
        Self { notification_id: Uuid::new_v4(), event_id, results }
    }

    /// Creates the result of a cycle that matched no subscriptions.
    pub fn empty(event_id: EventId) -> Self {
        Self::new(event_id, Vec::new())
    }

    /// Number of subscriptions that matched and were delivered to (or
    /// failed trying).
    pub fn matched(&self) -> usize {
        self.results.len()
    }

    /// Number of subscriptions delivered successfully.
    pub fn successes(&self) -> usize {
        self.results.iter().filter(|r| r.succeeded).count()
    }

    /// Number of subscriptions whose delivery failed.
    pub fn failures(&self) -> usize {
        self.results.iter().filter(|r| !r.succeeded).count()
    }

    /// Whether the cycle matched no subscriptions at all.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(subscription_id: SubscriptionId, number: u32, status: Option<u16>) -> DeliveryAttempt {
        DeliveryAttempt {
            subscription_id,
            attempt_number: number,
            status,
            error: status.filter(|s| *s >= 500).map(|s| DeliveryError::server_error(s, "")),
            started_at: Utc::now(),
            duration: Duration::from_millis(10),
        }
    }

    #[test]
    fn counters_partition_results() {
        let id = SubscriptionId::new();
        let ok = DeliveryResult::success(id, "a", vec![attempt(id, 1, Some(200))]);
        let failed = DeliveryResult::failure(
            id,
            "b",
            vec![attempt(id, 1, Some(500))],
            SubscriptionError::Delivery(DeliveryError::server_error(500, "")),
        );

        let result = NotificationResult::new(EventId::new(), vec![ok, failed]);
        assert_eq!(result.matched(), 2);
        assert_eq!(result.successes(), 1);
        assert_eq!(result.failures(), 1);
        assert!(!result.is_empty());
    }

    #[test]
    fn empty_result_reports_no_matches() {
        let result = NotificationResult::empty(EventId::new());
        assert!(result.is_empty());
        assert_eq!(result.matched(), 0);
    }

    #[test]
    fn attempts_used_tracks_recorded_attempts() {
        let id = SubscriptionId::new();
        let attempts =
            vec![attempt(id, 1, Some(500)), attempt(id, 2, Some(500)), attempt(id, 3, Some(200))];
        let result = DeliveryResult::success(id, "a", attempts);
        assert_eq!(result.attempts_used, 3);

        let skipped = DeliveryResult::not_attempted(
            id,
            "b",
            SubscriptionError::Factory("lookup failed".to_string()),
        );
        assert_eq!(skipped.attempts_used, 0);
        assert!(!skipped.succeeded);
    }

    #[test]
    fn attempt_success_requires_2xx_without_error() {
        let id = SubscriptionId::new();
        assert!(attempt(id, 1, Some(204)).succeeded());
        assert!(!attempt(id, 1, Some(500)).succeeded());
        assert!(!attempt(id, 1, None).succeeded());
    }
}
