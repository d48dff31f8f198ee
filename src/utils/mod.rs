//! Utilities: logging setup (level derived from -v / -q, `RUST_LOG` refines it).
//!
//! Key items:
//!   derive_level / init_logging
//!
//! Logs go to stderr; stdout is reserved for command output.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Map `--verbose` count and `--quiet` to a base level.
pub fn derive_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::ERROR;
    }
    match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Install the global subscriber. `RUST_LOG` directives are layered on top of
/// `level`; a second call is ignored.
pub fn init_logging(level: LevelFilter) {
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
