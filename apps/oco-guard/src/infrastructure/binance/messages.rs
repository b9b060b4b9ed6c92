//! Binance Futures Message Types
//!
//! Wire format types for the USDⓈ-M futures user-data stream and the REST
//! endpoints the guard calls. Field names follow Binance's single-letter
//! schema; only the fields the guard reads are required.
//!
//! # Message Types
//!
//! ## User-Data Stream (JSON)
//! - `ORDER_TRADE_UPDATE`: Order lifecycle events (new, fills, cancels, ...)
//! - `listenKeyExpired`: The listen key lapsed; the stream will close
//! - everything else (`ACCOUNT_UPDATE`, `MARGIN_CALL`, ...) is ignored
//!
//! ## REST
//! - `ListenKeyResponse`: body of `POST /fapi/v1/listenKey`
//! - `BinanceErrorResponse`: `{"code":-2011,"msg":"Unknown order sent."}`
//!
//! # References
//!
//! - [User Data Streams](https://developers.binance.com/docs/derivatives/usds-margined-futures/user-data-streams)

use serde::{Deserialize, Serialize};

// =============================================================================
// Event Types
// =============================================================================

/// Event type of an order update.
pub const ORDER_TRADE_UPDATE: &str = "ORDER_TRADE_UPDATE";

/// Event type sent when the listen key lapses.
pub const LISTEN_KEY_EXPIRED: &str = "listenKeyExpired";

// =============================================================================
// User-Data Stream
// =============================================================================

/// Order payload of an `ORDER_TRADE_UPDATE` event.
///
/// # Wire Format (JSON, abridged)
/// ```json
/// {"s":"BTCUSDT","c":"s1","S":"SELL","o":"STOP_MARKET","X":"NEW","x":"NEW","i":8886774}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUpdatePayload {
    /// Symbol.
    #[serde(rename = "s")]
    pub symbol: String,

    /// Client order id.
    #[serde(rename = "c")]
    pub client_order_id: String,

    /// Order type (`STOP_MARKET`, `TAKE_PROFIT_MARKET`, `LIMIT`, ...).
    #[serde(rename = "o")]
    pub order_type: String,

    /// Order status (`NEW`, `FILLED`, `CANCELED`, ...).
    #[serde(rename = "X")]
    pub order_status: String,

    /// Side (`BUY` / `SELL`).
    #[serde(rename = "S", default)]
    pub side: Option<String>,

    /// Execution type of this update.
    #[serde(rename = "x", default)]
    pub execution_type: Option<String>,

    /// Venue order id.
    #[serde(rename = "i", default)]
    pub order_id: Option<i64>,

    /// Average fill price.
    #[serde(rename = "ap", default)]
    pub average_price: Option<String>,

    /// Cumulative filled quantity.
    #[serde(rename = "z", default)]
    pub filled_quantity: Option<String>,
}

/// `ORDER_TRADE_UPDATE` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTradeUpdate {
    /// Event type, always `ORDER_TRADE_UPDATE`.
    #[serde(rename = "e")]
    pub event_type: String,

    /// Event time in milliseconds since the epoch.
    #[serde(rename = "E", default)]
    pub event_time: Option<i64>,

    /// Transaction time in milliseconds since the epoch.
    #[serde(rename = "T", default)]
    pub transaction_time: Option<i64>,

    /// Order details.
    #[serde(rename = "o")]
    pub order: OrderUpdatePayload,
}

// =============================================================================
// REST
// =============================================================================

/// Response of the listen key endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenKeyResponse {
    /// The listen key.
    #[serde(rename = "listenKey")]
    pub listen_key: String,
}

/// Error body returned by the REST API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinanceErrorResponse {
    /// Venue error code (negative).
    pub code: i64,
    /// Human-readable message.
    pub msg: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_order_trade_update() {
        let json = r#"{
            "e":"ORDER_TRADE_UPDATE","E":1568879465651,"T":1568879465650,
            "o":{"s":"BTCUSDT","c":"TEST","S":"SELL","o":"TRAILING_STOP_MARKET","f":"GTC",
                 "q":"0.001","p":"0","ap":"0","sp":"7103.04","x":"NEW","X":"NEW","i":8886774,
                 "l":"0","z":"0","L":"0","T":1568879465650,"t":0,"R":false,"ps":"LONG"}
        }"#;

        let update: OrderTradeUpdate = serde_json::from_str(json).unwrap();

        assert_eq!(update.event_type, ORDER_TRADE_UPDATE);
        assert_eq!(update.event_time, Some(1_568_879_465_651));
        assert_eq!(update.order.symbol, "BTCUSDT");
        assert_eq!(update.order.client_order_id, "TEST");
        assert_eq!(update.order.order_type, "TRAILING_STOP_MARKET");
        assert_eq!(update.order.order_status, "NEW");
        assert_eq!(update.order.order_id, Some(8_886_774));
    }

    #[test]
    fn order_payload_requires_client_order_id() {
        let json = r#"{"s":"BTCUSDT","o":"STOP_MARKET","X":"NEW"}"#;
        assert!(serde_json::from_str::<OrderUpdatePayload>(json).is_err());
    }

    #[test]
    fn deserialize_listen_key_response() {
        let json = r#"{"listenKey":"pqia91ma19a5s61cv6a81va65sdf19v8a65a1a5s61cv6a81va65sdf19v8a65a1"}"#;
        let response: ListenKeyResponse = serde_json::from_str(json).unwrap();
        assert!(response.listen_key.starts_with("pqia91"));
    }

    #[test]
    fn deserialize_error_response() {
        let json = r#"{"code":-2011,"msg":"Unknown order sent."}"#;
        let err: BinanceErrorResponse = serde_json::from_str(json).unwrap();
        assert_eq!(err.code, -2011);
        assert_eq!(err.msg, "Unknown order sent.");
    }
}
