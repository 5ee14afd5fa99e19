//! Stripe webhook signatures.
//!
//! The `stripe-signature` header looks like `t=<unix>,v1=<hex>[,v1=<hex>...]`.
//! Each `v1` is HMAC-SHA256 over `"<t>.<raw body>"` keyed with the endpoint
//! secret. Any matching `v1` is accepted so secrets can be rolled.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("missing stripe-signature header")]
    MissingSignature,
    #[error("invalid signature header: {0}")]
    InvalidFormat(String),
    #[error("webhook secret is not configured")]
    InvalidSecret,
    #[error("signature timestamp outside tolerance ({age}s old)")]
    Expired { age: i64 },
    #[error("no signature matches the payload")]
    VerificationFailed,
}

#[derive(Debug, PartialEq, Eq)]
struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

fn parse_header(header: &str) -> Result<SignatureHeader, SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            return Err(SignatureError::InvalidFormat(format!("expected key=value, got '{}'", part)));
        };
        match key {
            "t" => {
                let ts = value
                    .parse::<i64>()
                    .map_err(|_| SignatureError::InvalidFormat(format!("bad timestamp '{}'", value)))?;
                timestamp = Some(ts);
            }
            "v1" => {
                let bytes = hex::decode(value)
                    .map_err(|_| SignatureError::InvalidFormat("v1 is not hex".to_string()))?;
                signatures.push(bytes);
            }
            // v0 and future schemes are ignored
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| SignatureError::InvalidFormat("missing t=".to_string()))?;
    if signatures.is_empty() {
        return Err(SignatureError::InvalidFormat("missing v1=".to_string()));
    }

    Ok(SignatureHeader { timestamp, signatures })
}

fn mac_for(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, SignatureError> {
    if secret.is_empty() {
        return Err(SignatureError::InvalidSecret);
    }
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidSecret)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Verify a `stripe-signature` header against the raw request body.
///
/// `now` is the current unix time; timestamps further than `tolerance_secs`
/// from it are rejected.
pub fn verify(
    payload: &[u8],
    header: Option<&str>,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::MissingSignature)?;
    let parsed = parse_header(header)?;

    let age = now
        .checked_sub(parsed.timestamp)
        .ok_or_else(|| SignatureError::InvalidFormat(format!("timestamp {} out of range", parsed.timestamp)))?;
    if age.unsigned_abs() > u64::try_from(tolerance_secs).unwrap_or(0) {
        return Err(SignatureError::Expired { age });
    }

    for candidate in &parsed.signatures {
        // verify_slice compares in constant time
        if mac_for(secret, parsed.timestamp, payload)?.verify_slice(candidate).is_ok() {
            return Ok(());
        }
    }

    Err(SignatureError::VerificationFailed)
}

/// Produce a header value the way Stripe would sign `payload` at `timestamp`.
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> Result<String, SignatureError> {
    let mac = mac_for(secret, timestamp, payload)?;
    Ok(format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes())))
}
