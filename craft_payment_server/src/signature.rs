//! Webhook signature verification.
//!
//! Every delivery carries a signature header of the form `t=<unix seconds>,v1=<hex hmac-sha256>`, where the MAC is
//! computed over `"{t}." + raw body`. Signing the timestamp together with the body means a captured request cannot
//! be replayed outside the tolerance window with a fresh timestamp.
//!
//! Verification is constant-time (via the `Mac` comparison) and tries every configured secret in order, so secrets
//! can be rotated without dropping deliveries. The timestamp tolerance is only checked *after* a signature matched;
//! a stale timestamp on a forged request must not produce a different error than a bad signature on a fresh one
//! would reveal about the window.
use chrono::{DateTime, Duration, Utc};
use cpg_common::Secret;
use hmac::{Hmac, Mac};
use log::warn;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Payment-Signature";

/// Verification failures never name the secret (or which of the rotation set was tried); the log line and the error
/// carry only what the caller needs to diagnose a misconfigured sender.
#[derive(Debug, Clone, Error)]
pub enum SignatureError {
    #[error("The signature header is missing")]
    MissingHeader,
    #[error("The signature header is malformed. {0}")]
    MalformedHeader(String),
    #[error("The signature does not match the payload")]
    NoMatch,
    #[error("The signature is valid but its timestamp is outside the tolerance window ({age_secs}s old)")]
    StaleTimestamp { age_secs: i64 },
}

#[derive(Clone)]
pub struct SignatureVerifier {
    secrets: Vec<Secret<String>>,
    tolerance: Duration,
}

impl SignatureVerifier {
    pub fn new(secrets: Vec<Secret<String>>, tolerance: Duration) -> Self {
        Self { secrets, tolerance }
    }

    /// Verifies `header` against the raw `payload` and returns the index of the secret that matched, so callers can
    /// tell when the old secret of a rotation pair is still in use. `now` is injected so that tests can pin the
    /// clock.
    pub fn verify(&self, payload: &[u8], header: &str, now: DateTime<Utc>) -> Result<usize, SignatureError> {
        let (timestamp, signatures) = parse_header(header)?;
        let mut matched = None;
        for (i, secret) in self.secrets.iter().enumerate() {
            let mut mac = HmacSha256::new_from_slice(secret.reveal().as_bytes())
                .map_err(|e| SignatureError::MalformedHeader(e.to_string()))?;
            mac.update(timestamp.to_string().as_bytes());
            mac.update(b".");
            mac.update(payload);
            for signature in &signatures {
                if mac.clone().verify_slice(signature).is_ok() && matched.is_none() {
                    matched = Some(i);
                }
            }
        }
        let Some(index) = matched else {
            warn!("🔐️ A webhook delivery failed signature verification.");
            return Err(SignatureError::NoMatch);
        };
        let age_secs = (now.timestamp() - timestamp).abs();
        if age_secs > self.tolerance.num_seconds() {
            warn!("🔐️ A correctly signed webhook delivery was {age_secs}s old. Rejecting it as a replay.");
            return Err(SignatureError::StaleTimestamp { age_secs });
        }
        Ok(index)
    }
}

/// Splits `t=...,v1=...` into the timestamp and the (possibly several) candidate signatures. Unknown schemes are
/// ignored so the provider can introduce `v2` without breaking `v1` verifiers.
fn parse_header(header: &str) -> Result<(i64, Vec<Vec<u8>>), SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for element in header.split(',') {
        let Some((key, value)) = element.trim().split_once('=') else {
            return Err(SignatureError::MalformedHeader(format!("'{element}' is not a key=value pair")));
        };
        match key {
            "t" => {
                let t = value
                    .parse::<i64>()
                    .map_err(|e| SignatureError::MalformedHeader(format!("invalid timestamp: {e}")))?;
                timestamp = Some(t);
            },
            "v1" => {
                let sig =
                    hex::decode(value).map_err(|e| SignatureError::MalformedHeader(format!("invalid hex: {e}")))?;
                signatures.push(sig);
            },
            _ => {},
        }
    }
    let timestamp = timestamp.ok_or_else(|| SignatureError::MalformedHeader("no timestamp element".into()))?;
    if signatures.is_empty() {
        return Err(SignatureError::MalformedHeader("no v1 signature element".into()));
    }
    Ok((timestamp, signatures))
}
