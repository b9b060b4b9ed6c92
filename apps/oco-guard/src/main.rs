//! OCO Guard Binary
//!
//! Starts the bracket watchdog.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin oco-guard
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `API_KEY`: Binance API key
//! - `API_SECRET`: Binance API secret
//!
//! ## Optional
//! - `BINANCE_REST_URL`: REST base URL (default: <https://fapi.binance.com>)
//! - `BINANCE_STREAM_URL`: Stream base URL (default: <wss://fstream.binance.com/ws>)
//! - `OCO_GUARD_RENEWAL_INTERVAL_SECS`: Listen key renewal period (default: 1800)
//! - `OCO_GUARD_HTTP_TIMEOUT_SECS`: REST timeout (default: 10)
//! - `OCO_GUARD_RECV_WINDOW_MS`: `recvWindow` for signed calls (default: 5000)
//! - `OCO_GUARD_STREAM_IDLE_TIMEOUT_SECS`: Silence before the stream counts as closed (default: 600)
//! - `OCO_GUARD_RECONNECT`: Reconnect in-process when the stream ends (default: false)
//! - `OCO_GUARD_RECONNECT_DELAY_INITIAL_MS`: First backoff delay (default: 1000)
//! - `OCO_GUARD_RECONNECT_DELAY_MAX_SECS`: Backoff cap (default: 60)
//! - `OCO_GUARD_MAX_RECONNECT_ATTEMPTS`: 0 = unlimited (default: 0)
//! - `OCO_GUARD_METRICS_PORT`: Prometheus port, 0 disables (default: 0)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: oco-guard)
//! - `RUST_LOG`: Log filter (default: `oco_guard=info,warn`)
//!
//! # Exit Codes
//!
//! - 0: shutdown by signal, or the stream ended with reconnection disabled
//! - 1: credentials missing or empty
//! - 2: the guard could not start (listen key, connect) or gave up reconnecting

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use oco_guard::application::services::{
    BracketGuard, BracketService, GuardExit, SessionManager, StreamConsumer,
};
use oco_guard::infrastructure::binance::{
    BinanceRestClient, BinanceStreamConnector, ReconnectConfig, ReconnectPolicy, RequestSigner,
    StreamClientConfig,
};
use oco_guard::infrastructure::telemetry;
use oco_guard::{GuardConfig, init_metrics};
use tokio::signal;
use tokio_util::sync::CancellationToken;

const EXIT_CONFIG: u8 = 1;
const EXIT_STARTUP: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider was already installed");
    }

    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting OCO guard");

    let config = match GuardConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            tracing::error!(error = %e, "Configuration error");
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    log_config(&config);

    match run(config).await {
        Ok(exit) => {
            tracing::info!(?exit, "OCO guard stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = format!("{e:#}"), "OCO guard failed");
            ExitCode::from(EXIT_STARTUP)
        }
    }
}

/// Wire the adapters and services, then run the guard until it stops.
async fn run(config: GuardConfig) -> anyhow::Result<GuardExit> {
    init_metrics(config.metrics_port).context("failed to start metrics exporter")?;

    let signer = RequestSigner::new(
        config.credentials.api_key(),
        config.credentials.api_secret(),
        config.session.recv_window_ms,
    );
    let rest = Arc::new(
        BinanceRestClient::new(
            config.endpoints.rest_url.as_str(),
            signer,
            config.session.http_timeout,
        )
        .context("failed to build REST client")?,
    );
    let connector = Arc::new(BinanceStreamConnector::new(StreamClientConfig::new(
        config.endpoints.stream_url.as_str(),
        config.session.stream_idle_timeout,
    )));

    let brackets = Arc::new(BracketService::new(rest.clone()));
    let reconnect = config
        .reconnect
        .enabled
        .then(|| ReconnectPolicy::new(ReconnectConfig::from(&config.reconnect)));

    let mut guard = BracketGuard::new(
        SessionManager::new(rest, config.session.renewal_interval),
        StreamConsumer::new(connector),
        brackets,
        reconnect,
    );

    let shutdown_token = CancellationToken::new();
    let signals = tokio::spawn(await_shutdown(shutdown_token.clone()));

    let result = guard.run(&shutdown_token).await;
    signals.abort();

    Ok(result?)
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &GuardConfig) {
    tracing::info!(
        rest_url = %config.endpoints.rest_url,
        stream_url = %config.endpoints.stream_url,
        renewal_secs = config.session.renewal_interval.as_secs(),
        reconnect = config.reconnect.enabled,
        metrics_port = config.metrics_port,
        "Configuration loaded"
    );
    tracing::debug!(
        http_timeout_secs = config.session.http_timeout.as_secs(),
        recv_window_ms = config.session.recv_window_ms,
        idle_timeout_secs = config.session.stream_idle_timeout.as_secs(),
        max_reconnect_attempts = config.reconnect.max_attempts,
        "Session settings"
    );
}

/// Wait for SIGINT or SIGTERM and cancel `shutdown_token`.
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}
