use std::io::IsTerminal;

use crate::logger::{error::LoggerError, format::LoggerFormat};

/// Environment variable holding the filter directive, e.g. `info` or `keel_core=debug`.
pub const LOG_LEVEL_ENV: &str = "KEEL_LOG_LEVEL";
/// Environment variable selecting `text`, `json` or `journald` output.
pub const LOG_FORMAT_ENV: &str = "KEEL_LOG_FORMAT";

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    pub level: String,
    pub with_targets: bool,
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        let use_color = cfg!(test) || std::io::stdout().is_terminal();
        Self {
            format: LoggerFormat::Text,
            level: "info".to_string(),
            with_targets: true,
            use_color,
        }
    }
}

impl LoggerConfig {
    /// Defaults overridden by `KEEL_LOG_LEVEL` and `KEEL_LOG_FORMAT`.
    pub fn from_env() -> Result<Self, LoggerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, LoggerError> {
        let mut cfg = Self::default();
        if let Some(level) = lookup(LOG_LEVEL_ENV).filter(|v| !v.trim().is_empty()) {
            cfg.level = level.trim().to_string();
        }
        if let Some(format) = lookup(LOG_FORMAT_ENV) {
            cfg.format = format.parse()?;
        }
        if cfg.format != LoggerFormat::Text {
            cfg.use_color = false;
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let cfg = LoggerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.format, LoggerFormat::Text);
        assert_eq!(cfg.level, "info");
        assert!(cfg.with_targets);
    }

    #[test]
    fn env_overrides() {
        let cfg = LoggerConfig::from_lookup(lookup(&[
            (LOG_LEVEL_ENV, "keel_core=debug"),
            (LOG_FORMAT_ENV, "json"),
        ]))
        .unwrap();
        assert_eq!(cfg.format, LoggerFormat::Json);
        assert_eq!(cfg.level, "keel_core=debug");
        assert!(!cfg.use_color);
    }

    #[test]
    fn blank_level_keeps_default() {
        let cfg = LoggerConfig::from_lookup(lookup(&[(LOG_LEVEL_ENV, "  ")])).unwrap();
        assert_eq!(cfg.level, "info");
    }

    #[test]
    fn bad_format_is_an_error() {
        let err = LoggerConfig::from_lookup(lookup(&[(LOG_FORMAT_ENV, "xml")])).unwrap_err();
        assert_eq!(err, LoggerError::InvalidFormat("xml".into()));
    }
}
