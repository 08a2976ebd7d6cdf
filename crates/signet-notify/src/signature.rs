//! HMAC signing and verification for webhook payloads.
//!
//! Signatures are HMAC-SHA256 over the exact outbound byte sequence with a
//! UTF-8-encoded shared secret. The historical wire rendering is uppercase
//! hyphen-delimited hex (`AB-CD-...`); deployments without legacy receivers
//! can select plain lowercase hex. Verification is symmetric, constant-time,
//! and fails closed on any malformed input.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Rendering of the HMAC digest on the wire.
///
/// Part of the wire contract: sender and receiver must agree, though
/// [`verify`] accepts either rendering of a valid digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureEncoding {
    /// Uppercase hyphen-delimited hex, e.g. `8F-1A-...`.
    ///
    /// The historical wire default; preserve it when interoperating with
    /// existing receivers.
    HyphenatedUpper,

    /// Plain lowercase hex.
    Hex,
}

/// Signs a payload body with the shared secret.
///
/// Computes HMAC-SHA256 over `body` and renders the digest per `encoding`.
/// Signing an empty body or with an empty secret is permitted; whether an
/// absent secret means "unsigned delivery" is the caller's policy.
pub fn sign(body: &[u8], secret: &str, encoding: SignatureEncoding) -> String {
    let digest = compute_digest(body, secret);
    match encoding {
        SignatureEncoding::HyphenatedUpper => encode_hyphenated(&digest),
        SignatureEncoding::Hex => hex::encode(digest),
    }
}

/// Verifies a signature against a payload body and shared secret.
///
/// Accepts either wire rendering of the digest. Returns `false` for any
/// malformed signature input (wrong length, non-hex characters) rather
/// than erroring; missing-secret and missing-signature conditions are
/// policy errors handled by the receiver, not here.
pub fn verify(body: &[u8], signature: &str, secret: &str) -> bool {
    let Some(presented) = decode_signature(signature) else {
        return false;
    };
    let expected = compute_digest(body, secret);

    constant_time_eq(&presented, &expected)
}

fn compute_digest(body: &[u8], secret: &str) -> [u8; 32] {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    mac.finalize().into_bytes().into()
}

fn encode_hyphenated(digest: &[u8]) -> String {
    let mut out = String::with_capacity(digest.len() * 3);
    for (i, byte) in digest.iter().enumerate() {
        if i > 0 {
            out.push('-');
        }
        out.push_str(&format!("{byte:02X}"));
    }
    out
}

/// Decodes a presented signature in either wire rendering.
///
/// Returns `None` on any malformation: verification fails closed.
fn decode_signature(signature: &str) -> Option<[u8; 32]> {
    let compact: String = signature.chars().filter(|c| *c != '-').collect();
    let bytes = hex::decode(compact.to_ascii_lowercase()).ok()?;
    bytes.try_into().ok()
}

/// Constant-time digest comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8; 32], b: &[u8; 32]) -> bool {
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
