//! Application Services
//!
//! Services that drive the domain through the ports.
//!
//! - `SessionManager`: listen key acquisition and periodic renewal
//! - `StreamConsumer`: user-data stream decoding and dispatch
//! - `BracketService`: bracket tracking and sibling cancellation
//! - `BracketGuard`: session supervisor tying the three together

mod bracket;
mod guard;
mod session;
mod stream_consumer;

pub use bracket::BracketService;
pub use guard::{BracketGuard, GuardError, GuardExit};
pub use session::{DEFAULT_RENEWAL_INTERVAL, SessionManager};
pub use stream_consumer::{StreamConsumer, StreamOutcome};
