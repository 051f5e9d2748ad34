//! Log sink setup.

use crate::config::{ChainConfig, ConfigError};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::filter::LevelFilter;

/// Install a global `fmt` subscriber for `config`.
///
/// Events go to `config.log_file` (appended, no ANSI colours) or to stderr.
/// Calling this a second time in one process returns an error.
pub fn init_logging(config: &ChainConfig) -> Result<(), ConfigError> {
    let level: LevelFilter = config
        .log_level
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("unknown log_level: {}", config.log_level)))?;

    let builder = tracing_subscriber::fmt().with_max_level(level).with_target(false);

    let installed = match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    installed.map_err(|e| ConfigError::Invalid(format!("logger already installed: {e}")))
}
