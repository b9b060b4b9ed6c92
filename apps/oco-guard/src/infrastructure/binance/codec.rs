//! User-Data Stream Codec
//!
//! Decodes raw text frames from the futures user-data stream into
//! [`StreamMessage`]s. Binance sends one JSON object per frame; the `e`
//! field names the event.

use chrono::{DateTime, Utc};

use super::messages::{LISTEN_KEY_EXPIRED, ORDER_TRADE_UPDATE, OrderTradeUpdate};
use crate::domain::orders::{OrderEvent, OrderRole, OrderStatus};

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON decoding failed (bad syntax or missing required field).
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame is valid JSON but carries no event type.
    #[error("frame has no event type")]
    MissingEventType,

    /// Frame is not a JSON object.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),
}

/// A decoded stream frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamMessage {
    /// An order update, projected into the domain type.
    OrderUpdate(OrderEvent),
    /// The listen key expired; the venue will close the stream.
    ListenKeyExpired,
    /// Any other event, identified by its type.
    Ignored(String),
}

/// JSON codec for the user-data stream.
#[derive(Debug, Default, Clone)]
pub struct UserDataCodec;

impl UserDataCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode one text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not a JSON object, has no `e` field,
    /// or is an order update missing a required field.
    pub fn decode(&self, text: &str) -> Result<StreamMessage, CodecError> {
        let value: serde_json::Value = serde_json::from_str(text.trim())?;

        if !value.is_object() {
            let preview: String = text.trim().chars().take(50).collect();
            return Err(CodecError::InvalidFormat(format!(
                "expected JSON object, got: {preview}..."
            )));
        }

        let event_type = value
            .get("e")
            .and_then(|v| v.as_str())
            .ok_or(CodecError::MissingEventType)?;

        match event_type {
            ORDER_TRADE_UPDATE => {
                let update: OrderTradeUpdate = serde_json::from_value(value)?;
                Ok(StreamMessage::OrderUpdate(project(update)))
            }
            LISTEN_KEY_EXPIRED => Ok(StreamMessage::ListenKeyExpired),
            other => Ok(StreamMessage::Ignored(other.to_string())),
        }
    }
}

fn project(update: OrderTradeUpdate) -> OrderEvent {
    let order = update.order;
    OrderEvent {
        role: OrderRole::from_order_type(&order.order_type),
        status: OrderStatus::parse(&order.order_status),
        symbol: order.symbol,
        client_order_id: order.client_order_id,
        event_time: update
            .event_time
            .and_then(DateTime::<Utc>::from_timestamp_millis),
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn order_frame(order_type: &str, status: &str, id: &str) -> String {
        format!(
            r#"{{"e":"ORDER_TRADE_UPDATE","E":1700000000000,"T":1700000000000,
                "o":{{"s":"BTCUSDT","c":"{id}","S":"SELL","o":"{order_type}","X":"{status}","x":"TRADE","i":1}}}}"#
        )
    }

    #[test_case("STOP_MARKET", "NEW", OrderRole::Stop, OrderStatus::New ; "stop new")]
    #[test_case("TAKE_PROFIT_MARKET", "NEW", OrderRole::Target, OrderStatus::New ; "target new")]
    #[test_case("STOP_MARKET", "FILLED", OrderRole::Stop, OrderStatus::Filled ; "stop filled")]
    #[test_case("LIMIT", "CANCELED", OrderRole::Other, OrderStatus::Canceled ; "limit canceled")]
    #[test_case("TAKE_PROFIT_MARKET", "EXPIRED", OrderRole::Target, OrderStatus::Other("EXPIRED".to_string()) ; "target expired")]
    fn decodes_order_updates(order_type: &str, status: &str, role: OrderRole, expected: OrderStatus) {
        let codec = UserDataCodec::new();

        let msg = codec.decode(&order_frame(order_type, status, "abc")).unwrap();

        let StreamMessage::OrderUpdate(event) = msg else {
            panic!("expected order update, got {msg:?}");
        };
        assert_eq!(event.symbol, "BTCUSDT");
        assert_eq!(event.client_order_id, "abc");
        assert_eq!(event.role, role);
        assert_eq!(event.status, expected);
        assert_eq!(
            event.event_time.map(|t| t.timestamp_millis()),
            Some(1_700_000_000_000)
        );
    }

    #[test]
    fn other_events_are_ignored() {
        let codec = UserDataCodec::new();
        let frame = r#"{"e":"ACCOUNT_UPDATE","E":1564745798939,"T":1564745798938,"a":{"m":"ORDER","B":[],"P":[]}}"#;

        assert_eq!(
            codec.decode(frame).unwrap(),
            StreamMessage::Ignored("ACCOUNT_UPDATE".to_string())
        );
    }

    #[test]
    fn listen_key_expired_is_recognised() {
        let codec = UserDataCodec::new();
        let frame = r#"{"e":"listenKeyExpired","E":1576653824250,"listenKey":"WsCMN0a4KHUPTQuX6IUnqEZfB1inxmv1qR4kbf1LuEjur5VdbzqvyxqG9TSjVVxv"}"#;

        assert_eq!(codec.decode(frame).unwrap(), StreamMessage::ListenKeyExpired);
    }

    #[test_case("not json" ; "garbage")]
    #[test_case("" ; "empty")]
    #[test_case("[1,2,3]" ; "array")]
    #[test_case(r#"{"E":1}"# ; "no event type")]
    #[test_case(r#"{"e":"ORDER_TRADE_UPDATE","o":{"s":"BTCUSDT","o":"STOP_MARKET","X":"NEW"}}"# ; "missing client id")]
    #[test_case(r#"{"e":"ORDER_TRADE_UPDATE"}"# ; "missing order")]
    fn malformed_frames_are_errors(frame: &str) {
        assert!(UserDataCodec::new().decode(frame).is_err());
    }
}
