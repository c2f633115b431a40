//! Diagnostic logging for test binaries.
//!
//! The harness emits `tracing` events for spawn, send, match, timeout, EOF
//! and teardown. Nothing is printed unless a subscriber is installed; test
//! scripts call [`init`] first thing so `CUSH_LOG=debug` shows the exchange.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "CUSH_LOG";

/// Filter used when `CUSH_LOG` is unset or empty.
pub const DEFAULT_FILTER: &str = "warn";

/// Install a stderr subscriber filtered by `CUSH_LOG`.
///
/// Returns `false` if a global subscriber was already installed, which makes
/// repeated calls harmless.
pub fn init() -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_a_no_op() {
        let _ = init();
        assert!(!init());
    }
}
