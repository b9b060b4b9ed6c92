//! Domain Layer - Order events and bracket tracking.
//!
//! This layer contains the core domain types with no I/O. Everything here is
//! plain Rust and can be driven synchronously from tests.

/// Order lifecycle events as seen on the user-data stream.
pub mod orders;

/// Per-symbol bracket state machine.
pub mod bracket;
