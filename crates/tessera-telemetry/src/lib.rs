//! Tessera Telemetry - Logging setup for Tessera plugin hosts.
//!
//! Thin wrapper over `tracing-subscriber` that turns a [`LogConfig`] into an
//! installed global subscriber. With the `config` feature (on by default),
//! a [`LogConfig`] can be built from the `[logging]` section of a loaded
//! `tessera_config::Config`.
//!
//! # Example
//!
//! ```rust,no_run
//! use tessera_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), tessera_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("tessera_sdk=debug");
//!
//! setup_logging(&config)?;
//! tracing::info!("Plugin host starting");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, LogTarget, setup_default_logging, setup_logging};
