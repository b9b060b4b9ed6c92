//! Bracket Tracking
//!
//! Per-symbol state machine pairing a stop-loss leg with a take-profit leg.
//!
//! # Design
//!
//! Each symbol has two slots, `stop` and `target`, each either empty or
//! holding the client order id of a pending leg:
//!
//! - A `NEW` stop or target order fills (overwrites) its slot.
//! - A `FILLED` order whose id sits in one slot, while the other slot is
//!   occupied, empties the other slot and yields a [`CancellationRequest`]
//!   for the id that was in it.
//! - Everything else leaves the table untouched.
//!
//! The sibling slot is emptied in the same call that decides to cancel, so a
//! duplicate fill can never produce a second request for the same id.
//! Entries are created lazily and never expire.

use std::collections::HashMap;

use super::orders::{OrderEvent, OrderRole, OrderStatus};

// =============================================================================
// Types
// =============================================================================

/// Pending leg ids for one symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BracketState {
    /// Client order id of the pending stop leg.
    pub stop_order_id: Option<String>,
    /// Client order id of the pending take-profit leg.
    pub target_order_id: Option<String>,
}

impl BracketState {
    /// True when neither leg is pending.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.stop_order_id.is_none() && self.target_order_id.is_none()
    }
}

/// Cancellation the tracker wants issued against the venue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancellationRequest {
    /// Symbol of the order to cancel.
    pub symbol: String,
    /// Client order id to cancel.
    pub client_order_id: String,
}

/// Outcome of feeding one event into the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BracketTransition {
    /// A stop leg was recorded, replacing `previous` if there was one.
    StopArmed {
        /// Id that was in the slot before.
        previous: Option<String>,
    },
    /// A take-profit leg was recorded, replacing `previous` if there was one.
    TargetArmed {
        /// Id that was in the slot before.
        previous: Option<String>,
    },
    /// One leg filled; the sibling slot was emptied and must be canceled.
    CancelSibling {
        /// Role of the leg that filled.
        filled: OrderRole,
        /// Cancellation to issue for the sibling.
        request: CancellationRequest,
    },
    /// Nothing changed.
    Ignored,
}

// =============================================================================
// Tracker
// =============================================================================

/// Table of bracket states keyed by symbol.
#[derive(Debug, Default)]
pub struct BracketTracker {
    brackets: HashMap<String, BracketState>,
}

impl BracketTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one order event and report what changed.
    pub fn apply(&mut self, event: &OrderEvent) -> BracketTransition {
        let state = self.brackets.entry(event.symbol.clone()).or_default();

        match (&event.status, event.role) {
            (OrderStatus::New, OrderRole::Stop) => BracketTransition::StopArmed {
                previous: state.stop_order_id.replace(event.client_order_id.clone()),
            },
            (OrderStatus::New, OrderRole::Target) => BracketTransition::TargetArmed {
                previous: state.target_order_id.replace(event.client_order_id.clone()),
            },
            (OrderStatus::Filled, _) => Self::on_fill(&event.symbol, state, &event.client_order_id),
            _ => BracketTransition::Ignored,
        }
    }

    fn on_fill(symbol: &str, state: &mut BracketState, filled_id: &str) -> BracketTransition {
        let (filled, sibling) = if state.stop_order_id.as_deref() == Some(filled_id) {
            (OrderRole::Stop, state.target_order_id.take())
        } else if state.target_order_id.as_deref() == Some(filled_id) {
            (OrderRole::Target, state.stop_order_id.take())
        } else {
            return BracketTransition::Ignored;
        };

        match sibling {
            Some(client_order_id) => BracketTransition::CancelSibling {
                filled,
                request: CancellationRequest {
                    symbol: symbol.to_string(),
                    client_order_id,
                },
            },
            None => BracketTransition::Ignored,
        }
    }

    /// Current state for a symbol, if any event has been seen for it.
    #[must_use]
    pub fn state(&self, symbol: &str) -> Option<&BracketState> {
        self.brackets.get(symbol)
    }

    /// Number of symbols seen so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.brackets.len()
    }

    /// True when no symbol has been seen.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.brackets.is_empty()
    }

    /// Forget every bracket. Used when a fresh stream session starts.
    pub fn clear(&mut self) {
        self.brackets.clear();
    }
}
