//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the application services and port interfaces
//! that define how the domain interacts with the venue.

/// Port interfaces for the venue (REST, user-data stream).
pub mod ports;

/// Application services for sessions, streaming and bracket handling.
pub mod services;
