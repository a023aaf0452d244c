//! Diagnostic tracing setup.
//!
//! Tracing goes to stderr so stdout only carries responses, diffs and
//! prompts. `RUST_LOG` wins over the `--verbose` default.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Defaults to `warn`, or `info` when `verbose` is set.
///
/// ```bash
/// RUST_LOG=llm_tool=debug llm-tool edit "rename foo" src/lib.rs
/// ```
pub fn init(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
