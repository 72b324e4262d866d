//! Process-wide log output for keel binaries.
mod config;
mod error;
mod format;
mod log;

pub use config::{LOG_FORMAT_ENV, LOG_LEVEL_ENV, LoggerConfig};
pub use error::LoggerError;
pub use format::LoggerFormat;

/// Install the global subscriber selected by `cfg`. Fails if one is already installed.
pub fn logger_init(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    match cfg.format {
        LoggerFormat::Text => log::Logger::text(cfg),
        LoggerFormat::Json => log::Logger::json(cfg),
        LoggerFormat::Journald => log::Logger::journald(cfg),
    }
}

/// Read the logger settings from `KEEL_LOG_*` and install them.
pub fn logger_init_from_env() -> Result<LoggerConfig, LoggerError> {
    let cfg = LoggerConfig::from_env()?;
    logger_init(&cfg)?;
    Ok(cfg)
}
