//! Request Signing
//!
//! Binance `SIGNED` endpoints take an HMAC-SHA256 of the full query string,
//! keyed with the API secret, hex encoded and appended as `signature`.
//! Every signed request also carries `timestamp` (ms) and `recvWindow`.

use std::fmt;

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the API key on every REST call.
pub const API_KEY_HEADER: &str = "X-MBX-APIKEY";

/// Signing errors.
#[derive(Debug, Error)]
pub enum SigningError {
    /// The secret could not key the MAC.
    #[error("HMAC computation failed: {0}")]
    HmacFailed(String),
}

/// API key and secret, with the signing operation.
#[derive(Clone)]
pub struct RequestSigner {
    api_key: String,
    api_secret: String,
    recv_window_ms: u64,
}

impl RequestSigner {
    /// Create a signer.
    #[must_use]
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>, recv_window_ms: u64) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            recv_window_ms,
        }
    }

    /// API key for the `X-MBX-APIKEY` header.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Hex HMAC-SHA256 of `payload`.
    ///
    /// # Errors
    ///
    /// Returns an error if the MAC cannot be keyed.
    pub fn signature(&self, payload: &str) -> Result<String, SigningError> {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .map_err(|e| SigningError::HmacFailed(e.to_string()))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Build a signed query string from `params`, stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn signed_query(&self, params: &[(&str, &str)]) -> Result<String, SigningError> {
        self.signed_query_at(params, Utc::now().timestamp_millis())
    }

    /// Build a signed query string with an explicit timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn signed_query_at(
        &self,
        params: &[(&str, &str)],
        timestamp_ms: i64,
    ) -> Result<String, SigningError> {
        let mut query: String = params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        if !query.is_empty() {
            query.push('&');
        }
        query.push_str(&format!(
            "recvWindow={}&timestamp={timestamp_ms}",
            self.recv_window_ms
        ));

        let signature = self.signature(&query)?;
        Ok(format!("{query}&signature={signature}"))
    }
}

impl fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSigner")
            .field("api_key", &"[REDACTED]")
            .field("api_secret", &"[REDACTED]")
            .field("recv_window_ms", &self.recv_window_ms)
            .finish()
    }
}
