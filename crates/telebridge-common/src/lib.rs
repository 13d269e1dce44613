//! ---
//! tb_section: "01-core-functionality"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Shared primitives and utilities for the bridge runtime."
//! tb_version: "v0.0.0-prealpha"
//! tb_owner: "tbd"
//! ---
//! Shared primitives for the telebridge workspace: configuration loading,
//! tracing bootstrap, and epoch/calendar time conversions.

pub mod config;
pub mod logging;
pub mod time;

pub use config::{
    AppConfig, ChannelConfig, ChannelKind, LoadedAppConfig, LoggingConfig, OutputConfig,
    SubscriberConfig,
};
pub use logging::{init_console, init_tracing, LogFormat};
