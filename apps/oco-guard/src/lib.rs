#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! OCO Guard - Bracket Order Watchdog
//!
//! Keeps a Binance USD-M futures user-data stream alive and enforces
//! one-cancels-the-other on stop-loss / take-profit brackets: when one leg
//! fills, the surviving leg is canceled.
//!
//! # Layers (inside -> outside)
//!
//! - **Domain**: Order events and bracket tracking, no I/O
//!   - `orders`: Order roles, statuses and events
//!   - `bracket`: Per-symbol stop/target state machine
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Interfaces for the venue's REST API and user-data stream
//!   - `services`: Session renewal, stream consumption, bracket handling
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `binance`: REST client, request signing, WebSocket stream, codec
//!   - `config`: Environment configuration
//!   - `metrics`: Prometheus counters
//!   - `telemetry`: Logging and OpenTelemetry
//!
//! # Data Flow
//!
//! ```text
//!                  listen key
//! SessionManager ─────────────► BinanceRestClient (POST/PUT listenKey)
//!       │
//!       ▼
//! StreamConsumer ◄── frames ── user-data WebSocket
//!       │
//!       ▼ OrderEvent
//! BracketService ── cancel ──► BinanceRestClient (DELETE order)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Order events and bracket tracking.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::bracket::{BracketState, BracketTracker, BracketTransition, CancellationRequest};
pub use domain::orders::{OrderEvent, OrderRole, OrderStatus};

// Ports (for integration tests and alternative adapters)
pub use application::ports::{
    CancelError, ConnectError, ExchangePort, FrameSource, ListenKey, SessionError, StreamPort,
};

// Services
pub use application::services::{
    BracketGuard, BracketService, GuardError, GuardExit, SessionManager, StreamConsumer,
    StreamOutcome,
};

// Infrastructure config
pub use infrastructure::config::{ConfigError, GuardConfig};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
