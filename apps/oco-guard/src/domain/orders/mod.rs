//! Order Event Types
//!
//! Codec-agnostic representation of a single order update. The Binance
//! adapter projects `ORDER_TRADE_UPDATE` frames into [`OrderEvent`]; the
//! bracket tracker consumes them and never sees wire types.

use chrono::{DateTime, Utc};

/// Venue order type used for the stop-loss leg of a bracket.
pub const STOP_ORDER_TYPE: &str = "STOP_MARKET";

/// Venue order type used for the take-profit leg of a bracket.
pub const TARGET_ORDER_TYPE: &str = "TAKE_PROFIT_MARKET";

/// Role an order plays inside a bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderRole {
    /// Stop-triggered exit.
    Stop,
    /// Profit-target exit.
    Target,
    /// Anything else (entries, limit orders, ...).
    Other,
}

impl OrderRole {
    /// Map a venue order type onto a bracket role.
    ///
    /// Matching is exact; `stop_market` is not a stop.
    #[must_use]
    pub fn from_order_type(order_type: &str) -> Self {
        match order_type {
            STOP_ORDER_TYPE => Self::Stop,
            TARGET_ORDER_TYPE => Self::Target,
            _ => Self::Other,
        }
    }

    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Target => "target",
            Self::Other => "other",
        }
    }
}

/// Execution status of an order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    /// Accepted by the venue and resting.
    New,
    /// Fully executed.
    Filled,
    /// Canceled.
    Canceled,
    /// Any other venue status, passed through verbatim.
    Other(String),
}

impl OrderStatus {
    /// Parse a venue status string.
    #[must_use]
    pub fn parse(status: &str) -> Self {
        match status {
            "NEW" => Self::New,
            "FILLED" => Self::Filled,
            "CANCELED" => Self::Canceled,
            other => Self::Other(other.to_string()),
        }
    }

    /// Venue spelling of the status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::New => "NEW",
            Self::Filled => "FILLED",
            Self::Canceled => "CANCELED",
            Self::Other(s) => s,
        }
    }
}

/// One order update, decoded from a single stream frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderEvent {
    /// Trading pair, e.g. `BTCUSDT`.
    pub symbol: String,
    /// Bracket role derived from the order type.
    pub role: OrderRole,
    /// Order status after this update.
    pub status: OrderStatus,
    /// Client-assigned order id, unique for the order's lifetime.
    pub client_order_id: String,
    /// Venue event time, when present.
    pub event_time: Option<DateTime<Utc>>,
}

impl OrderEvent {
    /// Build an event without an event time.
    #[must_use]
    pub fn new(
        symbol: impl Into<String>,
        role: OrderRole,
        status: OrderStatus,
        client_order_id: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            role,
            status,
            client_order_id: client_order_id.into(),
            event_time: None,
        }
    }
}
