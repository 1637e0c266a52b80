//! Tracing bootstrap for binaries and tests embedding this crate.

use tracing_subscriber::{EnvFilter, prelude::*};

/// Install the default subscriber: `.env` is loaded if present, the
/// filter comes from `RUST_LOG`, and events carry file and line. Safe to
/// call more than once; only the first call installs anything.
pub fn init() {
    dotenvy::dotenv().ok();

    let _ = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(
            tracing_subscriber::fmt::layer()
                .with_line_number(true)
                .with_file(true),
        )
        .try_init();
}
