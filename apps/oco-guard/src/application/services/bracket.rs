//! Bracket Service
//!
//! Feeds order events into the [`BracketTracker`] and issues the sibling
//! cancellations it asks for.
//!
//! Cancellations are fire-and-forget: each runs as its own task so a slow
//! venue never holds up the stream. Their outcome is logged and counted, and
//! nothing is retried. A cancel that races a fill on the venue side comes
//! back as a rejection, which is expected and harmless.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::application::ports::{CancelError, ExchangePort};
use crate::domain::bracket::{BracketState, BracketTracker, BracketTransition, CancellationRequest};
use crate::domain::orders::OrderEvent;
use crate::infrastructure::metrics::{self, Outcome};

/// Tracks brackets and cancels orphaned legs.
pub struct BracketService {
    tracker: Mutex<BracketTracker>,
    exchange: Arc<dyn ExchangePort>,
}

impl BracketService {
    /// Create a service with an empty tracker.
    #[must_use]
    pub fn new(exchange: Arc<dyn ExchangePort>) -> Self {
        Self {
            tracker: Mutex::new(BracketTracker::new()),
            exchange,
        }
    }

    /// Apply one order event.
    ///
    /// Returns the handle of the spawned cancellation when the event filled
    /// one leg of a bracket whose other leg was still pending.
    pub fn handle_event(&self, event: &OrderEvent) -> Option<JoinHandle<()>> {
        metrics::record_order_event(event.role);

        let transition = self.tracker.lock().apply(event);

        match transition {
            BracketTransition::StopArmed { previous } => {
                tracing::info!(
                    symbol = %event.symbol,
                    stop_order_id = %event.client_order_id,
                    replaced = previous.as_deref().unwrap_or(""),
                    "Stop leg recorded"
                );
                None
            }
            BracketTransition::TargetArmed { previous } => {
                tracing::info!(
                    symbol = %event.symbol,
                    target_order_id = %event.client_order_id,
                    replaced = previous.as_deref().unwrap_or(""),
                    "Target leg recorded"
                );
                None
            }
            BracketTransition::CancelSibling { filled, request } => {
                tracing::info!(
                    symbol = %request.symbol,
                    filled = filled.as_str(),
                    filled_order_id = %event.client_order_id,
                    cancel_order_id = %request.client_order_id,
                    "Bracket leg filled, canceling sibling"
                );
                Some(self.spawn_cancel(request))
            }
            BracketTransition::Ignored => {
                tracing::trace!(
                    symbol = %event.symbol,
                    role = event.role.as_str(),
                    status = event.status.as_str(),
                    order_id = %event.client_order_id,
                    "Order event ignored"
                );
                None
            }
        }
    }

    /// Forget every tracked bracket.
    ///
    /// Called before a new session starts: leg ids from a previous stream
    /// cannot be trusted after a gap.
    pub fn reset(&self) {
        let mut tracker = self.tracker.lock();
        if !tracker.is_empty() {
            tracing::info!(symbols = tracker.len(), "Clearing tracked brackets");
        }
        tracker.clear();
    }

    /// Copy of the current state for a symbol.
    #[must_use]
    pub fn snapshot(&self, symbol: &str) -> Option<BracketState> {
        self.tracker.lock().state(symbol).cloned()
    }

    /// Number of symbols seen.
    #[must_use]
    pub fn tracked_symbols(&self) -> usize {
        self.tracker.lock().len()
    }

    fn spawn_cancel(&self, request: CancellationRequest) -> JoinHandle<()> {
        let exchange = Arc::clone(&self.exchange);
        let span = tracing::info_span!(
            "cancel_sibling",
            symbol = %request.symbol,
            order_id = %request.client_order_id,
        );
        tokio::spawn(
            async move {
                let result = exchange
                    .cancel_order(&request.symbol, &request.client_order_id)
                    .await;
                log_cancel_outcome(&request, result);
            }
            .instrument(span),
        )
    }
}

fn log_cancel_outcome(request: &CancellationRequest, result: Result<(), CancelError>) {
    match result {
        Ok(()) => {
            metrics::record_cancellation(Outcome::Ok);
            tracing::info!(
                symbol = %request.symbol,
                order_id = %request.client_order_id,
                "Sibling order canceled"
            );
        }
        Err(CancelError::Rejected { code, msg }) => {
            metrics::record_cancellation(Outcome::Failed);
            tracing::warn!(
                symbol = %request.symbol,
                order_id = %request.client_order_id,
                code,
                msg = %msg,
                "Venue rejected sibling cancel, order is likely already closed"
            );
        }
        Err(e) => {
            metrics::record_cancellation(Outcome::Failed);
            tracing::error!(
                symbol = %request.symbol,
                order_id = %request.client_order_id,
                error = %e,
                "Failed to cancel sibling order"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::MockExchangePort;
    use crate::domain::orders::{OrderRole, OrderStatus};

    fn event(symbol: &str, role: OrderRole, status: OrderStatus, id: &str) -> OrderEvent {
        OrderEvent::new(symbol, role, status, id)
    }

    fn no_cancels() -> Arc<MockExchangePort> {
        let mut exchange = MockExchangePort::new();
        exchange.expect_cancel_order().never();
        Arc::new(exchange)
    }

    #[tokio::test]
    async fn stop_fill_cancels_target() {
        let mut exchange = MockExchangePort::new();
        exchange
            .expect_cancel_order()
            .withf(|symbol, id| symbol == "BTCUSDT" && id == "t1")
            .times(1)
            .returning(|_, _| Ok(()));
        let service = BracketService::new(Arc::new(exchange));

        assert!(service.handle_event(&event("BTCUSDT", OrderRole::Stop, OrderStatus::New, "s1")).is_none());
        assert!(service.handle_event(&event("BTCUSDT", OrderRole::Target, OrderStatus::New, "t1")).is_none());

        let cancel = service
            .handle_event(&event("BTCUSDT", OrderRole::Stop, OrderStatus::Filled, "s1"))
            .unwrap();
        cancel.await.unwrap();

        let state = service.snapshot("BTCUSDT").unwrap();
        assert_eq!(state.stop_order_id.as_deref(), Some("s1"));
        assert_eq!(state.target_order_id, None);
    }

    #[tokio::test]
    async fn target_fill_cancels_stop() {
        let mut exchange = MockExchangePort::new();
        exchange
            .expect_cancel_order()
            .withf(|symbol, id| symbol == "ETHUSDT" && id == "s2")
            .times(1)
            .returning(|_, _| Ok(()));
        let service = BracketService::new(Arc::new(exchange));

        service.handle_event(&event("ETHUSDT", OrderRole::Stop, OrderStatus::New, "s2"));
        service.handle_event(&event("ETHUSDT", OrderRole::Target, OrderStatus::New, "t2"));

        let cancel = service
            .handle_event(&event("ETHUSDT", OrderRole::Target, OrderStatus::Filled, "t2"))
            .unwrap();
        cancel.await.unwrap();

        let state = service.snapshot("ETHUSDT").unwrap();
        assert_eq!(state.stop_order_id, None);
        assert_eq!(state.target_order_id.as_deref(), Some("t2"));
    }

    #[tokio::test]
    async fn fill_with_only_one_leg_cancels_nothing() {
        let service = BracketService::new(no_cancels());

        service.handle_event(&event("BTCUSDT", OrderRole::Stop, OrderStatus::New, "s1"));
        let handle =
            service.handle_event(&event("BTCUSDT", OrderRole::Stop, OrderStatus::Filled, "s1"));

        assert!(handle.is_none());
    }

    #[tokio::test]
    async fn duplicate_fill_cancels_once() {
        let mut exchange = MockExchangePort::new();
        exchange
            .expect_cancel_order()
            .times(1)
            .returning(|_, _| Ok(()));
        let service = BracketService::new(Arc::new(exchange));

        service.handle_event(&event("BTCUSDT", OrderRole::Stop, OrderStatus::New, "s1"));
        service.handle_event(&event("BTCUSDT", OrderRole::Target, OrderStatus::New, "t1"));

        let first = service.handle_event(&event("BTCUSDT", OrderRole::Stop, OrderStatus::Filled, "s1"));
        let second =
            service.handle_event(&event("BTCUSDT", OrderRole::Stop, OrderStatus::Filled, "s1"));

        first.unwrap().await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn rejected_cancel_is_not_fatal() {
        let mut exchange = MockExchangePort::new();
        exchange.expect_cancel_order().times(1).returning(|_, _| {
            Err(CancelError::Rejected {
                code: -2011,
                msg: "Unknown order sent.".to_string(),
            })
        });
        let service = BracketService::new(Arc::new(exchange));

        service.handle_event(&event("BTCUSDT", OrderRole::Stop, OrderStatus::New, "s1"));
        service.handle_event(&event("BTCUSDT", OrderRole::Target, OrderStatus::New, "t1"));
        let cancel = service
            .handle_event(&event("BTCUSDT", OrderRole::Target, OrderStatus::Filled, "t1"))
            .unwrap();

        cancel.await.unwrap();
        assert_eq!(service.snapshot("BTCUSDT").unwrap().stop_order_id, None);
    }

    #[tokio::test]
    async fn symbols_are_independent() {
        let mut exchange = MockExchangePort::new();
        exchange
            .expect_cancel_order()
            .withf(|symbol, id| symbol == "ETHUSDT" && id == "e-t")
            .times(1)
            .returning(|_, _| Ok(()));
        let service = BracketService::new(Arc::new(exchange));

        service.handle_event(&event("BTCUSDT", OrderRole::Stop, OrderStatus::New, "b-s"));
        service.handle_event(&event("BTCUSDT", OrderRole::Target, OrderStatus::New, "b-t"));
        service.handle_event(&event("ETHUSDT", OrderRole::Stop, OrderStatus::New, "e-s"));
        service.handle_event(&event("ETHUSDT", OrderRole::Target, OrderStatus::New, "e-t"));

        service
            .handle_event(&event("ETHUSDT", OrderRole::Stop, OrderStatus::Filled, "e-s"))
            .unwrap()
            .await
            .unwrap();

        let btc = service.snapshot("BTCUSDT").unwrap();
        assert_eq!(btc.stop_order_id.as_deref(), Some("b-s"));
        assert_eq!(btc.target_order_id.as_deref(), Some("b-t"));
    }

    #[tokio::test]
    async fn other_roles_and_statuses_are_ignored() {
        let service = BracketService::new(no_cancels());

        service.handle_event(&event("BTCUSDT", OrderRole::Other, OrderStatus::New, "l1"));
        service.handle_event(&event(
            "BTCUSDT",
            OrderRole::Stop,
            OrderStatus::Other("PARTIALLY_FILLED".to_string()),
            "s1",
        ));
        service.handle_event(&event("BTCUSDT", OrderRole::Stop, OrderStatus::Canceled, "s1"));

        let state = service.snapshot("BTCUSDT").unwrap();
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn reset_forgets_all_brackets() {
        let service = BracketService::new(no_cancels());

        service.handle_event(&event("BTCUSDT", OrderRole::Stop, OrderStatus::New, "s1"));
        service.handle_event(&event("BTCUSDT", OrderRole::Target, OrderStatus::New, "t1"));
        assert_eq!(service.tracked_symbols(), 1);

        service.reset();

        assert_eq!(service.tracked_symbols(), 0);
        assert!(service.snapshot("BTCUSDT").is_none());
        assert!(service
            .handle_event(&event("BTCUSDT", OrderRole::Stop, OrderStatus::Filled, "s1"))
            .is_none());
    }
}
