//! Tracing subscriber setup for the `folio` binary.
//!
//! Logs go to stderr so that command output on stdout stays machine-readable.
//! The filter comes from `RUST_LOG`, falling back to the given default.

use std::sync::Once;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Install the global subscriber. Later calls are no-ops.
pub fn init_logging(default_filter: &str) {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(false),
        );

        if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("[folio] Failed to set tracing subscriber: {}", e);
        }
    });
}
