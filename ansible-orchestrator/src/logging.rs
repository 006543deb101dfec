//! Tracing subscriber setup
//!
//! Logs go to stderr; stdout is reserved for operation responses.

use std::sync::Once;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "ansible_orchestrator=info";

static INIT: Once = Once::new();

/// Install the global subscriber. `RUST_LOG` wins over the default filter.
/// Later calls are no-ops.
pub fn init() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    });
}
