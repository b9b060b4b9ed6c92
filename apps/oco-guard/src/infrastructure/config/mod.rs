//! Configuration Module
//!
//! Configuration loading for the guard service.

mod settings;

pub use settings::{
    ConfigError, Credentials, EndpointSettings, GuardConfig, ReconnectSettings, SessionSettings,
};
