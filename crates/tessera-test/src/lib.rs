//! Tessera Test - Shared test utilities for the Tessera plugin SDK.
//!
//! Mock plugins and agents, plus helpers that lay out plugin directories on
//! disk for discovery tests.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! tessera-test.workspace = true
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tessera_sdk::PluginRegistry;
//! use tessera_test::MockPlugin;
//!
//! #[test]
//! fn registers_mock() {
//!     let registry = PluginRegistry::new();
//!     let contract = registry
//!         .register(Arc::new(MockPlugin::new("com.example.mock", "1.0.0")), false)
//!         .unwrap();
//!     assert_eq!(contract.version(), "1.0.0");
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;

use tessera_telemetry::{LogConfig, LogFormat, LogTarget, setup_logging};

/// Route `tracing` output to the test harness at `RUST_LOG` level (default
/// `warn`).
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn init_test_tracing() {
    let level = std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string());
    let config = LogConfig::new(level)
        .with_format(LogFormat::Compact)
        .with_target(LogTarget::Test)
        .without_ansi();
    // A subscriber from an earlier test, or an invalid RUST_LOG, leaves logging as is.
    let _ = setup_logging(&config);
}
