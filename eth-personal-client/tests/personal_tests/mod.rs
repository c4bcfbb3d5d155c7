//! Personal namespace tests
//!
//! Account management and signing against an in-process development node.

use std::sync::Once;
use tracing_subscriber::EnvFilter;


pub mod account_tests;
pub mod signing_tests;

static INIT: Once = Once::new();

/// Initializes the global logger (only once).
pub fn init_logger() {
    INIT.call_once(|| {
        let filter = EnvFilter::from_default_env()
            .add_directive("eth_personal_client=info".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .init();
    });
}
