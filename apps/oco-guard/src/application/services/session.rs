//! Session Manager
//!
//! Owns the listen key: acquires it at session start and renews it on a
//! fixed period until the session's cancellation token fires.
//!
//! Every tick issues one renewal as its own task, whatever happened on the
//! previous tick. Failures are logged and counted, never retried early.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{ExchangePort, ListenKey, SessionError};
use crate::infrastructure::metrics::{self, Outcome};

/// Default renewal period, half the venue's 60-minute validity.
pub const DEFAULT_RENEWAL_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Acquires and keeps alive the streaming credential.
pub struct SessionManager {
    exchange: Arc<dyn ExchangePort>,
    renewal_interval: Duration,
}

impl SessionManager {
    /// Create a session manager renewing every `renewal_interval`.
    #[must_use]
    pub fn new(exchange: Arc<dyn ExchangePort>, renewal_interval: Duration) -> Self {
        Self {
            exchange,
            renewal_interval,
        }
    }

    /// Renewal period.
    #[must_use]
    pub const fn renewal_interval(&self) -> Duration {
        self.renewal_interval
    }

    /// Obtain a fresh listen key.
    ///
    /// # Errors
    ///
    /// Returns the venue's refusal or the transport failure. No valid
    /// session can exist without a key, so callers abort on this.
    pub async fn acquire(&self) -> Result<ListenKey, SessionError> {
        match self.exchange.obtain_stream_credential().await {
            Ok(key) => {
                tracing::info!(listen_key = %key.redacted(), "Listen key acquired");
                Ok(key)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to acquire listen key");
                Err(e)
            }
        }
    }

    /// Renew `key` once, logging the outcome.
    ///
    /// # Errors
    ///
    /// Returns the failure after logging it; the caller may ignore it.
    pub async fn renew(&self, key: &ListenKey) -> Result<(), SessionError> {
        renew_once(self.exchange.as_ref(), key).await
    }

    /// Start the periodic renewal timer for `key`.
    ///
    /// The first renewal happens one interval after this call. The timer
    /// stops when `cancel` fires.
    pub fn spawn_renewal(&self, key: ListenKey, cancel: CancellationToken) -> JoinHandle<()> {
        let exchange = Arc::clone(&self.exchange);
        let period = self.renewal_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::debug!(period_secs = period.as_secs(), "Listen key renewal timer started");

            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        tracing::debug!("Listen key renewal timer stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let exchange = Arc::clone(&exchange);
                        let key = key.clone();
                        tokio::spawn(async move {
                            let _ = renew_once(exchange.as_ref(), &key).await;
                        });
                    }
                }
            }
        })
    }
}

async fn renew_once(exchange: &dyn ExchangePort, key: &ListenKey) -> Result<(), SessionError> {
    match exchange.renew_stream_credential(key).await {
        Ok(()) => {
            metrics::record_renewal(Outcome::Ok);
            tracing::info!(listen_key = %key.redacted(), "Listen key extended");
            Ok(())
        }
        Err(e) => {
            metrics::record_renewal(Outcome::Failed);
            tracing::warn!(
                listen_key = %key.redacted(),
                error = %e,
                "Failed to extend listen key, will retry on next tick"
            );
            Err(e)
        }
    }
}
