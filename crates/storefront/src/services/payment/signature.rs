//! Webhook signature verification.
//!
//! Header format: `t=<unix seconds>,v1=<hex hmac>[,v1=<hex hmac>...]`, where
//! each `v1` is HMAC-SHA256 over `"<t>.<raw body>"` keyed with the webhook
//! secret. Any matching `v1` is accepted, which lets the gateway roll
//! secrets.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Header the gateway signs webhooks in unless `PAYMENT_SIGNATURE_HEADER`
/// names another.
pub const DEFAULT_SIGNATURE_HEADER: &str = "stripe-signature";

/// Why a webhook signature was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing signature header")]
    MissingHeader,

    #[error("malformed signature header: {0}")]
    Malformed(&'static str),

    #[error("signature timestamp outside tolerance ({age}s > {tolerance}s)")]
    Stale { age: u64, tolerance: u64 },

    #[error("signature mismatch")]
    Mismatch,

    #[error("webhook secret rejected by HMAC")]
    InvalidKey,
}

/// Verifies (and for tests, produces) webhook signatures.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: SecretString,
    tolerance_secs: u64,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secret", &"[REDACTED]")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish()
    }
}

impl SignatureVerifier {
    #[must_use]
    pub const fn new(secret: SecretString, tolerance_secs: u64) -> Self {
        Self {
            secret,
            tolerance_secs,
        }
    }

    /// Verify `header` against `body` at the current time.
    ///
    /// # Errors
    ///
    /// See [`Self::verify_at`].
    pub fn verify(&self, header: Option<&str>, body: &[u8]) -> Result<(), SignatureError> {
        self.verify_at(header, body, chrono::Utc::now().timestamp())
    }

    /// Verify `header` against `body` as of `now` (unix seconds).
    ///
    /// # Errors
    ///
    /// Fails if the header is missing or malformed, the timestamp is further
    /// than the tolerance from `now`, or no `v1` entry matches.
    pub fn verify_at(
        &self,
        header: Option<&str>,
        body: &[u8],
        now: i64,
    ) -> Result<(), SignatureError> {
        let header = header.ok_or(SignatureError::MissingHeader)?;
        let parsed = parse_header(header)?;

        let age = now.abs_diff(parsed.timestamp);
        if age > self.tolerance_secs {
            return Err(SignatureError::Stale {
                age,
                tolerance: self.tolerance_secs,
            });
        }

        for candidate in parsed.signatures {
            let Ok(bytes) = hex::decode(candidate) else {
                continue;
            };
            // verify_slice compares in constant time
            if self.mac(parsed.timestamp, body)?.verify_slice(&bytes).is_ok() {
                return Ok(());
            }
        }
        Err(SignatureError::Mismatch)
    }

    /// Produce a header value for `body` at `timestamp`.
    ///
    /// # Errors
    ///
    /// Returns `SignatureError::InvalidKey` if the secret cannot key an HMAC.
    pub fn sign(&self, timestamp: i64, body: &[u8]) -> Result<String, SignatureError> {
        let digest = self.mac(timestamp, body)?.finalize().into_bytes();
        Ok(format!("t={timestamp},v1={}", hex::encode(digest)))
    }

    fn mac(&self, timestamp: i64, body: &[u8]) -> Result<HmacSha256, SignatureError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| SignatureError::InvalidKey)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body);
        Ok(mac)
    }
}

struct ParsedHeader<'a> {
    timestamp: i64,
    signatures: Vec<&'a str>,
}

fn parse_header(header: &str) -> Result<ParsedHeader<'_>, SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            return Err(SignatureError::Malformed("expected key=value pairs"));
        };
        match key {
            "t" => {
                if timestamp.is_some() {
                    return Err(SignatureError::Malformed("duplicate timestamp"));
                }
                let ts = value
                    .parse::<i64>()
                    .map_err(|_| SignatureError::Malformed("timestamp is not an integer"))?;
                timestamp = Some(ts);
            }
            "v1" => signatures.push(value),
            // other schemes are ignored
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed("missing timestamp"))?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed("missing v1 signature"));
    }
    Ok(ParsedHeader {
        timestamp,
        signatures,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const NOW: i64 = 1_760_000_000;
    const BODY: &[u8] = br#"{"id":"evt_1","type":"checkout.session.completed"}"#;

    fn verifier() -> SignatureVerifier {
        SignatureVerifier::new(SecretString::from("whsec_test_Zq81LmNv0pR2sT4u"), 300)
    }

    #[test]
    fn test_valid_signature() {
        let v = verifier();
        let header = v.sign(NOW, BODY).unwrap();
        assert_eq!(v.verify_at(Some(&header), BODY, NOW + 10), Ok(()));
    }

    #[test]
    fn test_tampered_body() {
        let v = verifier();
        let header = v.sign(NOW, BODY).unwrap();
        assert_eq!(
            v.verify_at(Some(&header), b"{\"id\":\"evt_2\"}", NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_wrong_secret() {
        let other = SignatureVerifier::new(SecretString::from("whsec_other_Yp72KmMu9oQ1"), 300);
        let header = other.sign(NOW, BODY).unwrap();
        assert_eq!(
            verifier().verify_at(Some(&header), BODY, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_stale_timestamp() {
        let v = verifier();
        let header = v.sign(NOW - 301, BODY).unwrap();
        assert_eq!(
            v.verify_at(Some(&header), BODY, NOW),
            Err(SignatureError::Stale {
                age: 301,
                tolerance: 300
            })
        );
    }

    #[test]
    fn test_any_v1_may_match() {
        let v = verifier();
        let good = v.sign(NOW, BODY).unwrap();
        let good_sig = good.split_once("v1=").map(|(_, s)| s).unwrap_or_default();
        let header = format!("t={NOW},v1=deadbeef,v1={good_sig}");
        assert_eq!(v.verify_at(Some(&header), BODY, NOW), Ok(()));
    }

    #[test]
    fn test_missing_and_malformed() {
        let v = verifier();
        assert_eq!(v.verify_at(None, BODY, NOW), Err(SignatureError::MissingHeader));
        assert!(matches!(
            v.verify_at(Some("garbage"), BODY, NOW),
            Err(SignatureError::Malformed(_))
        ));
        assert!(matches!(
            v.verify_at(Some("v1=abcd"), BODY, NOW),
            Err(SignatureError::Malformed("missing timestamp"))
        ));
        assert!(matches!(
            v.verify_at(Some(&format!("t={NOW}")), BODY, NOW),
            Err(SignatureError::Malformed("missing v1 signature"))
        ));
    }
}
