//! Port Interfaces
//!
//! Contracts the core relies on, implemented by the Binance adapters in the
//! infrastructure layer and by in-memory fakes in tests.
//!
//! ## Driven Ports (Outbound)
//!
//! - `ExchangePort`: credential lifecycle and order cancellation over REST
//! - `StreamPort`: opens the user-data stream for a credential
//! - `FrameSource`: raw frames from one open stream

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

// =============================================================================
// Credential
// =============================================================================

/// Streaming credential issued by the venue (a listen key).
///
/// Valid for 60 minutes unless renewed.
#[derive(Clone, PartialEq, Eq)]
pub struct ListenKey(String);

impl ListenKey {
    /// Wrap a raw listen key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw key, as needed in the stream URL.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix that is safe to log.
    #[must_use]
    pub fn redacted(&self) -> String {
        let prefix: String = self.0.chars().take(6).collect();
        format!("{prefix}…")
    }
}

impl fmt::Debug for ListenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ListenKey").field(&self.redacted()).finish()
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Failure to obtain or renew a listen key.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// Venue answered with a non-success status.
    #[error("venue rejected listen key request ({status}): {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
    /// Request never got an answer.
    #[error("listen key request failed: {0}")]
    Transport(String),
    /// Response could not be decoded.
    #[error("invalid listen key response: {0}")]
    InvalidResponse(String),
}

/// Failure to open the user-data stream.
#[derive(Debug, Clone, Error)]
pub enum ConnectError {
    /// Stream URL could not be built.
    #[error("invalid stream url: {0}")]
    InvalidUrl(String),
    /// WebSocket handshake failed.
    #[error("stream handshake failed: {0}")]
    Handshake(String),
}

/// Failure to cancel an order.
#[derive(Debug, Clone, Error)]
pub enum CancelError {
    /// Venue refused the cancel (unknown order, already filled, ...).
    #[error("venue rejected cancel ({code}): {msg}")]
    Rejected {
        /// Venue error code.
        code: i64,
        /// Venue error message.
        msg: String,
    },
    /// Non-success status without a venue error body.
    #[error("cancel failed with HTTP {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
    /// Request never got an answer.
    #[error("cancel request failed: {0}")]
    Transport(String),
    /// Request could not be signed.
    #[error("cancel request could not be signed: {0}")]
    Signing(String),
}

// =============================================================================
// Ports
// =============================================================================

/// REST side of the venue.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExchangePort: Send + Sync {
    /// Create a new listen key.
    async fn obtain_stream_credential(&self) -> Result<ListenKey, SessionError>;

    /// Extend the validity of a listen key.
    async fn renew_stream_credential(&self, key: &ListenKey) -> Result<(), SessionError>;

    /// Cancel an order by its client order id.
    ///
    /// Canceling an id that is already filled or canceled returns
    /// `CancelError::Rejected`; callers treat that as non-fatal.
    async fn cancel_order(&self, symbol: &str, client_order_id: &str) -> Result<(), CancelError>;
}

/// Opens user-data streams.
#[async_trait]
pub trait StreamPort: Send + Sync {
    /// Open a stream scoped to `key`.
    async fn open_stream(&self, key: &ListenKey) -> Result<Box<dyn FrameSource>, ConnectError>;
}

/// Raw frames from one open stream.
#[async_trait]
pub trait FrameSource: Send {
    /// Next text frame, or `None` once the stream has ended.
    ///
    /// Must be cancel-safe: dropping the future loses no frame.
    async fn receive_frame(&mut self) -> Option<String>;

    /// Close the stream. Safe to call on an already-ended stream.
    async fn close(&mut self);
}
