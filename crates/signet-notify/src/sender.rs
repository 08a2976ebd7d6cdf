//! HTTP delivery of signed webhook payloads with bounded retry.
//!
//! One sender is shared by a whole deployment; reqwest's connection pool
//! handles concurrent deliveries to many endpoints. Each attempt is
//! classified for the retry state machine: success ends it, a client-error
//! rejection ends it permanently, and server errors or transport failures
//! consume retry budget. Attempts within one subscription are strictly
//! sequential.

use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::Utc;
use reqwest::header::HeaderMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use url::Url;
use uuid::Uuid;

use signet_core::{EventId, WebhookSubscription};

use crate::{
    config::{NotifierConfig, SignatureLocation},
    error::{DeliveryError, NotifyError, SubscriptionError},
    result::{DeliveryAttempt, DeliveryResult},
};

/// Maximum response-body length retained on a failed attempt.
const MAX_ERROR_BODY: usize = 1024;

/// A serialized payload ready for delivery, with its signature when the
/// subscription declares a secret.
#[derive(Debug, Clone)]
pub struct SignedPayload {
    /// Exact outbound byte sequence; also the bytes the signature covers.
    pub body: Bytes,

    /// Rendered signature, absent for unsigned delivery.
    pub signature: Option<String>,
}

impl SignedPayload {
    /// Creates an unsigned payload.
    pub fn unsigned(body: impl Into<Bytes>) -> Self {
        Self { body: body.into(), signature: None }
    }

    /// Creates a signed payload.
    pub fn signed(body: impl Into<Bytes>, signature: impl Into<String>) -> Self {
        Self { body: body.into(), signature: Some(signature.into()) }
    }
}

/// Delivers signed payloads to subscription destinations.
pub struct DeliverySender {
    client: reqwest::Client,
    config: NotifierConfig,
}

impl DeliverySender {
    /// Creates a sender from the deployment configuration.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Configuration`] when the HTTP client cannot
    /// be built with the configured settings.
    pub fn new(config: &NotifierConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                NotifyError::configuration(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { client, config: config.clone() })
    }

    /// Delivers a payload with up to `retry_count + 1` sequential attempts.
    ///
    /// The budget comes from the subscription, falling back to the
    /// deployment default. Cancellation is observed before each attempt and
    /// during backoff; an attempt already in flight finishes within the
    /// per-attempt timeout. The returned result records every attempt made.
    pub async fn deliver_with_retry(
        &self,
        subscription: &WebhookSubscription,
        payload: &SignedPayload,
        event_id: EventId,
        cancel: &CancellationToken,
    ) -> DeliveryResult {
        let delivery_id = Uuid::new_v4();
        let retry_count = subscription.retry_count.unwrap_or(self.config.default_retry_count);
        let max_attempts = retry_count.saturating_add(1);

        let span = info_span!(
            "webhook_delivery",
            subscription_id = %subscription.id,
            event_id = %event_id,
            delivery_id = %delivery_id,
            url = %subscription.destination_url,
        );

        async move {
            let mut schedule = self.config.retry.schedule();
            let mut attempts: Vec<DeliveryAttempt> = Vec::new();
            let mut attempt_number = 0u32;

            loop {
                attempt_number += 1;

                if cancel.is_cancelled() {
                    debug!(attempt = attempt_number, "delivery cancelled before attempt");
                    return DeliveryResult::failure(
                        subscription.id,
                        &subscription.name,
                        attempts,
                        SubscriptionError::Delivery(DeliveryError::Cancelled),
                    );
                }

                let (attempt, retry_after) = self
                    .attempt(subscription, payload, event_id, delivery_id, attempt_number)
                    .await;
                let outcome = attempt.error.clone();
                attempts.push(attempt);

                let error = match outcome {
                    None => {
                        info!(attempt = attempt_number, "webhook delivered");
                        return DeliveryResult::success(
                            subscription.id,
                            &subscription.name,
                            attempts,
                        );
                    },
                    Some(error) => error,
                };

                if !error.is_retryable() {
                    warn!(attempt = attempt_number, %error, "delivery rejected, not retrying");
                    return DeliveryResult::failure(
                        subscription.id,
                        &subscription.name,
                        attempts,
                        SubscriptionError::Delivery(error),
                    );
                }

                if attempt_number >= max_attempts {
                    warn!(attempts = attempt_number, %error, "retry budget exhausted");
                    return DeliveryResult::failure(
                        subscription.id,
                        &subscription.name,
                        attempts,
                        SubscriptionError::Delivery(error),
                    );
                }

                let delay = schedule.next_delay(retry_after);
                debug!(attempt = attempt_number, delay_ms = delay.as_millis(), "backing off");

                tokio::select! {
                    () = cancel.cancelled() => {
                        debug!("delivery cancelled during backoff");
                        return DeliveryResult::failure(
                            subscription.id,
                            &subscription.name,
                            attempts,
                            SubscriptionError::Delivery(error),
                        );
                    },
                    () = tokio::time::sleep(delay) => {},
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Performs a single delivery attempt.
    pub async fn deliver_once(
        &self,
        subscription: &WebhookSubscription,
        payload: &SignedPayload,
        event_id: EventId,
        attempt_number: u32,
    ) -> DeliveryAttempt {
        self.attempt(subscription, payload, event_id, Uuid::new_v4(), attempt_number).await.0
    }

    /// One attempt, plus any `Retry-After` hint from a retryable response.
    async fn attempt(
        &self,
        subscription: &WebhookSubscription,
        payload: &SignedPayload,
        event_id: EventId,
        delivery_id: Uuid,
        attempt_number: u32,
    ) -> (DeliveryAttempt, Option<Duration>) {
        let started_at = Utc::now();
        let start = Instant::now();

        let url = self.destination_url(subscription, payload.signature.as_deref());
        let mut request = self
            .client
            .post(url)
            .body(payload.body.clone())
            .header("content-type", "application/json");

        for (name, value) in &subscription.headers {
            if !is_managed_header(name) {
                request = request.header(name, value);
            }
        }

        if self.config.signature_location == SignatureLocation::Header {
            if let Some(signature) = &payload.signature {
                request = request.header(&self.config.signature_header_name, signature);
            }
        }

        request = request
            .header("X-Signet-Event-Id", event_id.to_string())
            .header("X-Signet-Delivery-Id", delivery_id.to_string())
            .header("X-Signet-Attempt", attempt_number.to_string());

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let error = if e.is_timeout() {
                    DeliveryError::timeout(self.config.request_timeout.as_secs())
                } else if e.is_connect() {
                    DeliveryError::network(format!("connection failed: {e}"))
                } else {
                    DeliveryError::network(e.to_string())
                };
                warn!(attempt = attempt_number, %error, "delivery attempt failed");

                let attempt = DeliveryAttempt {
                    subscription_id: subscription.id,
                    attempt_number,
                    status: None,
                    error: Some(error),
                    started_at,
                    duration: start.elapsed(),
                };
                return (attempt, None);
            },
        };

        let status = response.status().as_u16();
        let retry_after = retry_after_hint(response.headers());
        let error = match status {
            200..=299 => None,
            400..=499 => Some(DeliveryError::rejected(status, read_error_body(response).await)),
            _ => Some(DeliveryError::server_error(status, read_error_body(response).await)),
        };

        debug!(
            attempt = attempt_number,
            status,
            duration_ms = start.elapsed().as_millis(),
            "received response"
        );

        let attempt = DeliveryAttempt {
            subscription_id: subscription.id,
            attempt_number,
            status: Some(status),
            error,
            started_at,
            duration: start.elapsed(),
        };
        let hint = attempt.error.as_ref().is_some_and(DeliveryError::is_retryable);
        (attempt, if hint { retry_after } else { None })
    }

    /// Destination URL, with the signature appended when placement is
    /// query-string-based.
    fn destination_url(&self, subscription: &WebhookSubscription, signature: Option<&str>) -> Url {
        let mut url = subscription.destination_url.clone();
        if self.config.signature_location == SignatureLocation::QueryString {
            if let Some(signature) = signature {
                url.query_pairs_mut().append_pair(&self.config.signature_query_key, signature);
            }
        }
        url
    }
}

/// Reads a failed response's body for diagnostics, truncated.
async fn read_error_body(response: reqwest::Response) -> String {
    match response.bytes().await {
        Ok(bytes) if bytes.len() > MAX_ERROR_BODY => {
            let truncated = String::from_utf8_lossy(&bytes[..MAX_ERROR_BODY]);
            format!("{truncated}... (truncated)")
        },
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => format!("[failed to read response body: {e}]"),
    }
}

/// Parses a `Retry-After` header as either delay-seconds or an HTTP date.
fn retry_after_hint(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get("retry-after")?.to_str().ok()?;

    if let Ok(seconds) = raw.trim().parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let at = chrono::DateTime::parse_from_rfc2822(raw).ok()?;
    let delay = at.with_timezone(&Utc).signed_duration_since(Utc::now());
    delay.to_std().ok()
}

/// Headers owned by the sender; subscription-declared values for these are
/// not forwarded.
fn is_managed_header(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "content-length"
            | "content-type"
            | "host"
            | "user-agent"
            | "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}
