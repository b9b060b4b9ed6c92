//! Stream Consumer
//!
//! Opens the user-data stream for a listen key and turns its frames into
//! [`OrderEvent`]s, one at a time and in arrival order.
//!
//! Frames that fail to decode are logged and skipped; a malformed frame
//! never ends the stream. Non-order events are dropped. The loop ends when
//! the stream ends or shutdown is requested, and the connection is closed on
//! every exit path.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::application::ports::{ConnectError, FrameSource, ListenKey, StreamPort};
use crate::domain::orders::OrderEvent;
use crate::infrastructure::binance::{StreamMessage, UserDataCodec};
use crate::infrastructure::metrics;

/// Why a stream run finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The venue side ended the stream (close, error, idle timeout).
    EndOfStream,
    /// Shutdown was requested.
    Shutdown,
}

/// Reads the user-data stream.
pub struct StreamConsumer {
    stream: Arc<dyn StreamPort>,
    codec: UserDataCodec,
}

impl StreamConsumer {
    /// Create a consumer over a stream port.
    #[must_use]
    pub fn new(stream: Arc<dyn StreamPort>) -> Self {
        Self {
            stream,
            codec: UserDataCodec::new(),
        }
    }

    /// Open the stream scoped to `key`.
    ///
    /// # Errors
    ///
    /// Returns the handshake failure; the caller decides whether that is fatal.
    pub async fn connect(&self, key: &ListenKey) -> Result<Box<dyn FrameSource>, ConnectError> {
        self.stream.open_stream(key).await.inspect_err(|e| {
            tracing::error!(listen_key = %key.redacted(), error = %e, "Failed to open user-data stream");
        })
    }

    /// Deliver order events from `connection` to `on_event` until the stream
    /// ends or `cancel` fires.
    pub async fn run<F>(
        &self,
        mut connection: Box<dyn FrameSource>,
        cancel: &CancellationToken,
        mut on_event: F,
    ) -> StreamOutcome
    where
        F: FnMut(OrderEvent) + Send,
    {
        let outcome = loop {
            let frame = tokio::select! {
                biased;
                () = cancel.cancelled() => break StreamOutcome::Shutdown,
                frame = connection.receive_frame() => frame,
            };

            let Some(text) = frame else {
                break StreamOutcome::EndOfStream;
            };
            metrics::record_frame_received();

            match self.codec.decode(&text) {
                Ok(StreamMessage::OrderUpdate(event)) => {
                    tracing::debug!(
                        symbol = %event.symbol,
                        role = event.role.as_str(),
                        status = event.status.as_str(),
                        order_id = %event.client_order_id,
                        "Order update received"
                    );
                    on_event(event);
                }
                Ok(StreamMessage::ListenKeyExpired) => {
                    tracing::warn!("Listen key expired, the venue will close the stream");
                }
                Ok(StreamMessage::Ignored(event_type)) => {
                    tracing::trace!(event_type = %event_type, "Ignoring user-data event");
                }
                Err(e) => {
                    metrics::record_frame_rejected();
                    let preview: String = text.chars().take(120).collect();
                    tracing::warn!(error = %e, frame = %preview, "Skipping malformed frame");
                }
            }
        };

        connection.close().await;
        match outcome {
            StreamOutcome::EndOfStream => tracing::warn!("User-data stream ended"),
            StreamOutcome::Shutdown => tracing::info!("User-data stream closed for shutdown"),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::*;
    use crate::domain::orders::{OrderRole, OrderStatus};

    struct ChannelSource {
        rx: mpsc::UnboundedReceiver<String>,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl FrameSource for ChannelSource {
        async fn receive_frame(&mut self) -> Option<String> {
            self.rx.recv().await
        }

        async fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    struct RefusingPort;

    #[async_trait]
    impl StreamPort for RefusingPort {
        async fn open_stream(&self, _key: &ListenKey) -> Result<Box<dyn FrameSource>, ConnectError> {
            Err(ConnectError::Handshake("403 Forbidden".to_string()))
        }
    }

    fn source() -> (mpsc::UnboundedSender<String>, Box<dyn FrameSource>, Arc<AtomicBool>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let source = ChannelSource {
            rx,
            closed: Arc::clone(&closed),
        };
        (tx, Box::new(source), closed)
    }

    fn order_frame(symbol: &str, order_type: &str, status: &str, id: &str) -> String {
        format!(
            r#"{{"e":"ORDER_TRADE_UPDATE","E":1700000000000,"T":1700000000000,"o":{{"s":"{symbol}","c":"{id}","S":"SELL","o":"{order_type}","x":"NEW","X":"{status}","i":1}}}}"#
        )
    }

    fn consumer() -> StreamConsumer {
        StreamConsumer::new(Arc::new(RefusingPort))
    }

    #[tokio::test]
    async fn delivers_order_events_in_order() {
        let (tx, conn, closed) = source();
        tx.send(order_frame("BTCUSDT", "STOP_MARKET", "NEW", "s1")).unwrap();
        tx.send(order_frame("BTCUSDT", "TAKE_PROFIT_MARKET", "NEW", "t1")).unwrap();
        tx.send(order_frame("BTCUSDT", "STOP_MARKET", "FILLED", "s1")).unwrap();
        drop(tx);

        let mut events = Vec::new();
        let outcome = consumer()
            .run(conn, &CancellationToken::new(), |e| events.push(e))
            .await;

        assert_eq!(outcome, StreamOutcome::EndOfStream);
        assert!(closed.load(Ordering::SeqCst));
        let seen: Vec<_> = events
            .into_iter()
            .map(|e| (e.role, e.status, e.client_order_id))
            .collect();
        assert_eq!(
            seen,
            vec![
                (OrderRole::Stop, OrderStatus::New, "s1".to_string()),
                (OrderRole::Target, OrderStatus::New, "t1".to_string()),
                (OrderRole::Stop, OrderStatus::Filled, "s1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn malformed_frames_are_skipped() {
        let (tx, conn, _closed) = source();
        tx.send("not json".to_string()).unwrap();
        tx.send(r#"{"e":"ORDER_TRADE_UPDATE","o":{"s":"BTCUSDT"}}"#.to_string())
            .unwrap();
        tx.send(r#"{"E":123}"#.to_string()).unwrap();
        tx.send(order_frame("ETHUSDT", "LIMIT", "NEW", "l1")).unwrap();
        drop(tx);

        let mut events = Vec::new();
        consumer()
            .run(conn, &CancellationToken::new(), |e| events.push(e))
            .await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].role, OrderRole::Other);
        assert_eq!(events[0].client_order_id, "l1");
    }

    #[tokio::test]
    async fn non_order_events_are_dropped() {
        let (tx, conn, _closed) = source();
        tx.send(r#"{"e":"ACCOUNT_UPDATE","E":1,"T":1,"a":{}}"#.to_string())
            .unwrap();
        tx.send(r#"{"e":"listenKeyExpired","E":1}"#.to_string())
            .unwrap();
        drop(tx);

        let mut count = 0;
        let outcome = consumer()
            .run(conn, &CancellationToken::new(), |_| count += 1)
            .await;

        assert_eq!(outcome, StreamOutcome::EndOfStream);
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn shutdown_closes_connection() {
        let (tx, conn, closed) = source();
        let cancel = CancellationToken::new();

        let run = {
            let cancel = cancel.clone();
            tokio::spawn(async move { consumer().run(conn, &cancel, |_| {}).await })
        };
        cancel.cancel();

        assert_eq!(run.await.unwrap(), StreamOutcome::Shutdown);
        assert!(closed.load(Ordering::SeqCst));
        drop(tx);
    }

    #[tokio::test]
    async fn connect_failure_is_returned() {
        let result = consumer().connect(&ListenKey::new("abc")).await;
        assert!(matches!(result, Err(ConnectError::Handshake(_))));
    }
}
