//! Tracing setup of the training program.

use crate::common::*;
use tracing_subscriber::{filter::LevelFilter, prelude::*, EnvFilter};

/// Install a compact stderr logger.
///
/// `RUST_LOG` selects the levels if present. Otherwise `INFO` and above are
/// shown.
pub fn init_tracing() -> Result<()> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();
    let filter_layer = {
        let filter = EnvFilter::from_default_env();
        if env::var("RUST_LOG").is_err() {
            filter.add_directive(LevelFilter::INFO.into())
        } else {
            filter
        }
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()
        .map_err(|err| format_err!("failed to install the logger: {}", err))?;
    Ok(())
}
