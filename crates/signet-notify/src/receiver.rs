//! Receiver-side verification of inbound webhooks.
//!
//! The symmetric half of the wire contract: a receiving endpoint extracts
//! the signature from the configured location, recomputes it over the raw
//! received body with the shared secret, and rejects the payload on
//! mismatch. A rejected payload must be discarded, never parsed as an
//! event.

use std::collections::HashMap;

use crate::{
    config::{ReceiverConfig, SignatureLocation},
    error::ReceiveError,
    signature,
};

/// Verifies inbound webhook requests against the shared secret.
pub struct WebhookReceiver {
    config: ReceiverConfig,
}

impl WebhookReceiver {
    /// Creates a receiver with the given configuration.
    pub fn new(config: ReceiverConfig) -> Self {
        Self { config }
    }

    /// Verifies a received request's signature.
    ///
    /// `headers` and `query` are the request's header and query-string
    /// maps; only the configured location is consulted. Header lookup is
    /// case-insensitive, query keys are exact. With verification disabled
    /// every request passes.
    ///
    /// # Errors
    ///
    /// - [`ReceiveError::MissingSecret`] when verification is enabled but
    ///   no secret is configured.
    /// - [`ReceiveError::MissingSignature`] when the request carries no
    ///   signature in the configured location.
    /// - [`ReceiveError::SignatureInvalid`] when the recomputed signature
    ///   does not match; the body must be discarded.
    pub fn verify(
        &self,
        body: &[u8],
        headers: &HashMap<String, String>,
        query: &HashMap<String, String>,
    ) -> Result<(), ReceiveError> {
        if !self.config.verify_signature {
            return Ok(());
        }

        let secret = self.config.secret.as_deref().ok_or(ReceiveError::MissingSecret)?;
        let presented = self.extract_signature(headers, query)?;

        if signature::verify(body, presented, secret) {
            Ok(())
        } else {
            Err(ReceiveError::SignatureInvalid)
        }
    }

    fn extract_signature<'a>(
        &self,
        headers: &'a HashMap<String, String>,
        query: &'a HashMap<String, String>,
    ) -> Result<&'a str, ReceiveError> {
        let presented = match self.config.signature_location {
            SignatureLocation::Header => headers
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(&self.config.signature_header_name))
                .map(|(_, value)| value.as_str()),
            SignatureLocation::QueryString => {
                query.get(&self.config.signature_query_key).map(String::as_str)
            },
        };
        presented.filter(|s| !s.is_empty()).ok_or(ReceiveError::MissingSignature)
    }
}
