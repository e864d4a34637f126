//! Logging init: structured output to stderr, filter from `RUST_LOG`.

use tracing_subscriber::EnvFilter;

/// Default filter directive for the given verbosity (`-v` count)
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn,dweb_cache=info",
        1 => "info,dweb_cache=debug",
        _ => "debug,dweb_cache=trace",
    }
}

/// Initialize logging to stderr so stdout stays reserved for command output.
///
/// `RUST_LOG` takes precedence over the verbosity-derived default.
pub fn init_logging(verbosity: u8) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
