//! Diagnostic tracing for the deployer.
//!
//! Tracing goes to stderr. Operation results are printed to stdout by the CLI
//! and never pass through the subscriber, so JSON output stays
//! machine-readable at any verbosity.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset, by `-v` count.
pub fn default_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "warn,deployer=info",
        _ => "warn,deployer=debug",
    }
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins over `verbose` when set.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=deployer::io=trace deployer test https://github.com/org/agent
/// ```
pub fn init(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose > 1)
                .compact(),
        )
        .init();
}
