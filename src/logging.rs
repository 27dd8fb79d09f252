//! Tracing subscriber setup for the binary. The library only emits events.

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber on stderr. `RUST_LOG` wins when set; otherwise
/// `verbose` selects debug output for this crate and warnings elsewhere.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init(verbose: bool) {
    let default_directive = if verbose { "warn,tally=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
