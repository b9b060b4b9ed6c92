//! User-Data Stream WebSocket Client
//!
//! Opens Binance's futures user-data stream for a listen key and yields its
//! raw text frames.
//!
//! # Stream URL
//!
//! - Production: `wss://fstream.binance.com/ws/<listenKey>`
//! - Testnet: `wss://stream.binancefuture.com/ws/<listenKey>`
//!
//! # Protocol
//!
//! No subscribe or auth messages: the listen key in the path scopes the
//! stream. The server pings every few minutes; tungstenite answers pings
//! while reading. A stream that stays silent past the idle timeout is
//! treated as dead and reported as ended.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::application::ports::{ConnectError, FrameSource, ListenKey, StreamPort};
use crate::infrastructure::metrics;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the user-data stream client.
#[derive(Debug, Clone)]
pub struct StreamClientConfig {
    /// WebSocket base URL; the listen key is appended as the last segment.
    pub base_url: String,
    /// Longest silence tolerated before the stream is considered dead.
    pub idle_timeout: Duration,
}

impl StreamClientConfig {
    /// Create a new configuration.
    #[must_use]
    pub fn new(base_url: impl Into<String>, idle_timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            idle_timeout,
        }
    }

    /// Configuration for the production futures stream.
    #[must_use]
    pub fn live() -> Self {
        Self::new("wss://fstream.binance.com/ws", Duration::from_secs(600))
    }

    /// Full stream URL for `key`.
    #[must_use]
    pub fn stream_url(&self, key: &ListenKey) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key.as_str())
    }
}

// =============================================================================
// Connector
// =============================================================================

/// Opens user-data streams over WebSocket.
#[derive(Debug, Clone)]
pub struct BinanceStreamConnector {
    config: StreamClientConfig,
}

impl BinanceStreamConnector {
    /// Create a connector.
    #[must_use]
    pub const fn new(config: StreamClientConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl StreamPort for BinanceStreamConnector {
    async fn open_stream(&self, key: &ListenKey) -> Result<Box<dyn FrameSource>, ConnectError> {
        let url = self.config.stream_url(key);
        tracing::info!(
            base_url = %self.config.base_url,
            listen_key = %key.redacted(),
            "Connecting to user-data stream"
        );

        let (ws, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| ConnectError::Handshake(e.to_string()))?;

        metrics::set_stream_connected(true);
        tracing::info!("Connected to user-data stream");

        Ok(Box::new(WebSocketFrameSource {
            ws,
            idle_timeout: self.config.idle_timeout,
            ended: false,
        }))
    }
}

// =============================================================================
// Frame Source
// =============================================================================

/// One open user-data stream.
pub struct WebSocketFrameSource {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    idle_timeout: Duration,
    ended: bool,
}

impl WebSocketFrameSource {
    fn end(&mut self) -> Option<String> {
        self.ended = true;
        metrics::set_stream_connected(false);
        None
    }
}

#[async_trait]
impl FrameSource for WebSocketFrameSource {
    async fn receive_frame(&mut self) -> Option<String> {
        while !self.ended {
            let next = tokio::time::timeout(self.idle_timeout, self.ws.next()).await;

            match next {
                Err(_) => {
                    tracing::warn!(
                        idle_secs = self.idle_timeout.as_secs(),
                        "No traffic on user-data stream, treating it as closed"
                    );
                    return self.end();
                }
                Ok(None) => {
                    tracing::info!("WebSocket stream ended");
                    return self.end();
                }
                Ok(Some(Err(e))) => {
                    tracing::warn!(error = %e, "WebSocket transport error");
                    return self.end();
                }
                Ok(Some(Ok(Message::Text(text)))) => return Some(text.as_str().to_owned()),
                Ok(Some(Ok(Message::Binary(data)))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => return Some(text),
                    Err(_) => {
                        tracing::warn!(len = data.len(), "Received non-UTF8 binary message");
                    }
                },
                Ok(Some(Ok(Message::Close(frame)))) => {
                    tracing::info!(frame = ?frame, "Server sent close frame");
                    return self.end();
                }
                Ok(Some(Ok(_))) => {
                    // Ping/pong; the reply is queued by tungstenite.
                }
            }
        }
        None
    }

    async fn close(&mut self) {
        if self.ended {
            return;
        }
        if let Err(e) = self.ws.close(None).await {
            tracing::debug!(error = %e, "Error while closing WebSocket");
        }
        self.end();
        tracing::info!("User-data stream closed");
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    async fn serve(frames: Vec<Message>, hold_open: bool) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            for frame in frames {
                ws.send(frame).await.unwrap();
            }
            if hold_open {
                tokio::time::sleep(Duration::from_secs(30)).await;
            } else {
                let _ = ws.close(None).await;
            }
        });

        format!("ws://{addr}/ws")
    }

    #[test]
    fn stream_url_appends_listen_key() {
        let config = StreamClientConfig::new("wss://fstream.binance.com/ws/", Duration::from_secs(1));
        assert_eq!(
            config.stream_url(&ListenKey::new("abc")),
            "wss://fstream.binance.com/ws/abc"
        );
    }

    #[tokio::test]
    async fn yields_text_frames_until_close() {
        let url = serve(
            vec![
                Message::text(r#"{"e":"ACCOUNT_UPDATE"}"#),
                Message::binary(br#"{"e":"ORDER_TRADE_UPDATE"}"#.to_vec()),
            ],
            false,
        )
        .await;
        let connector =
            BinanceStreamConnector::new(StreamClientConfig::new(url, Duration::from_secs(5)));

        let mut source = connector.open_stream(&ListenKey::new("key")).await.unwrap();

        assert_eq!(
            source.receive_frame().await.as_deref(),
            Some(r#"{"e":"ACCOUNT_UPDATE"}"#)
        );
        assert_eq!(
            source.receive_frame().await.as_deref(),
            Some(r#"{"e":"ORDER_TRADE_UPDATE"}"#)
        );
        assert_eq!(source.receive_frame().await, None);
        assert_eq!(source.receive_frame().await, None);
    }

    #[tokio::test]
    async fn silent_stream_ends_after_idle_timeout() {
        let url = serve(vec![], true).await;
        let connector =
            BinanceStreamConnector::new(StreamClientConfig::new(url, Duration::from_millis(100)));

        let mut source = connector.open_stream(&ListenKey::new("key")).await.unwrap();

        assert_eq!(source.receive_frame().await, None);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let url = serve(vec![], true).await;
        let connector =
            BinanceStreamConnector::new(StreamClientConfig::new(url, Duration::from_secs(5)));

        let mut source = connector.open_stream(&ListenKey::new("key")).await.unwrap();
        source.close().await;
        source.close().await;

        assert_eq!(source.receive_frame().await, None);
    }

    #[tokio::test]
    async fn refused_connection_is_handshake_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let connector = BinanceStreamConnector::new(StreamClientConfig::new(
            format!("ws://{addr}/ws"),
            Duration::from_secs(1),
        ));

        let result = connector.open_stream(&ListenKey::new("key")).await;

        assert!(matches!(result, Err(ConnectError::Handshake(_))));
    }
}
