//! Bracket Guard
//!
//! Supervises sessions: acquire a listen key, start its renewal timer, open
//! the stream and feed every order event to the [`BracketService`].
//!
//! By default the guard runs one session and returns when its stream ends;
//! an external supervisor restarts the process. With reconnection enabled it
//! starts a fresh session instead, backing off between attempts. Each new
//! session starts from an empty bracket table. Failures before the first
//! session is up are always fatal. Only a session that stayed up for
//! [`STABLE_SESSION`] resets the backoff, so a venue that accepts and
//! immediately drops the stream still exhausts the attempt budget.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;

use super::bracket::BracketService;
use super::session::SessionManager;
use super::stream_consumer::{StreamConsumer, StreamOutcome};
use crate::application::ports::{ConnectError, SessionError};
use crate::infrastructure::binance::ReconnectPolicy;
use crate::infrastructure::metrics;

/// A session that stays up this long restores the full reconnect budget.
const STABLE_SESSION: Duration = Duration::from_secs(60);

/// How the guard finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardExit {
    /// Shutdown was requested.
    Shutdown,
    /// The stream ended and reconnection is disabled.
    StreamEnded,
}

/// Unrecoverable guard failure.
#[derive(Debug, Error)]
pub enum GuardError {
    /// Listen key could not be acquired.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// Stream could not be opened.
    #[error(transparent)]
    Connect(#[from] ConnectError),
    /// Reconnection gave up.
    #[error("gave up reconnecting after {attempts} attempts")]
    ReconnectExhausted {
        /// Attempts made.
        attempts: u32,
    },
}

/// Session supervisor.
pub struct BracketGuard {
    session: SessionManager,
    consumer: StreamConsumer,
    brackets: Arc<BracketService>,
    reconnect: Option<ReconnectPolicy>,
}

impl BracketGuard {
    /// Create a guard. Pass a policy to reconnect in-process.
    #[must_use]
    pub const fn new(
        session: SessionManager,
        consumer: StreamConsumer,
        brackets: Arc<BracketService>,
        reconnect: Option<ReconnectPolicy>,
    ) -> Self {
        Self {
            session,
            consumer,
            brackets,
            reconnect,
        }
    }

    /// Run until shutdown, stream end or an unrecoverable failure.
    ///
    /// # Errors
    ///
    /// Returns the failure of the first session's key acquisition or
    /// connect, or [`GuardError::ReconnectExhausted`] once the policy's
    /// attempts run out.
    pub async fn run(&mut self, shutdown: &CancellationToken) -> Result<GuardExit, GuardError> {
        let mut established = false;

        loop {
            let started = Instant::now();
            let result = self.run_session(shutdown, &mut established).await;

            let Some(policy) = self.reconnect.as_mut() else {
                return match result? {
                    StreamOutcome::Shutdown => Ok(GuardExit::Shutdown),
                    StreamOutcome::EndOfStream => Ok(GuardExit::StreamEnded),
                };
            };

            match result {
                Ok(StreamOutcome::Shutdown) => return Ok(GuardExit::Shutdown),
                Ok(StreamOutcome::EndOfStream) if started.elapsed() >= STABLE_SESSION => {
                    policy.reset();
                }
                Ok(StreamOutcome::EndOfStream) => {
                    tracing::warn!(
                        lifetime_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                        "Stream closed shortly after connecting"
                    );
                }
                Err(e) if !established => return Err(e),
                Err(e) => tracing::warn!(error = %e, "Session failed"),
            }

            let Some(delay) = policy.next_delay() else {
                let attempts = policy.attempt_count();
                tracing::error!(attempts, "Reconnect attempts exhausted");
                return Err(GuardError::ReconnectExhausted { attempts });
            };

            metrics::record_reconnect();
            tracing::info!(
                attempt = policy.attempt_count(),
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Reconnecting to user-data stream"
            );

            tokio::select! {
                () = shutdown.cancelled() => return Ok(GuardExit::Shutdown),
                () = tokio::time::sleep(delay) => {}
            }

            self.brackets.reset();
        }
    }

    /// One session. The renewal timer and the connection are released on
    /// every exit, including when this future is dropped mid-session.
    #[tracing::instrument(name = "session", skip_all, fields(listen_key = tracing::field::Empty))]
    async fn run_session(
        &self,
        shutdown: &CancellationToken,
        established: &mut bool,
    ) -> Result<StreamOutcome, GuardError> {
        let key = self.session.acquire().await?;
        tracing::Span::current().record("listen_key", tracing::field::display(key.redacted()));

        let session_token = shutdown.child_token();
        let _stop_session = session_token.clone().drop_guard();
        let renewal = AbortOnDropHandle::new(
            self.session
                .spawn_renewal(key.clone(), session_token.clone()),
        );

        let connection = match self.consumer.connect(&key).await {
            Ok(connection) => connection,
            Err(e) => {
                stop_renewal(&session_token, renewal).await;
                return Err(e.into());
            }
        };
        *established = true;

        let brackets = Arc::clone(&self.brackets);
        let outcome = self
            .consumer
            .run(connection, &session_token, move |event| {
                brackets.handle_event(&event);
            })
            .await;

        stop_renewal(&session_token, renewal).await;
        Ok(outcome)
    }
}

async fn stop_renewal(session_token: &CancellationToken, renewal: AbortOnDropHandle<()>) {
    session_token.cancel();
    if let Err(e) = renewal.await {
        tracing::warn!(error = %e, "Renewal timer task failed");
    }
}
