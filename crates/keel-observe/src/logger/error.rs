use thiserror::Error;

/// Failures while setting up the keel log output.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoggerError {
    #[error("KEEL_LOG_FORMAT={0:?} is not one of text, json or journald")]
    InvalidFormat(String),
    #[error("journald output needs linux and the `journald` feature of keel-observe")]
    JournaldNotSupported,
    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
    #[error("cannot install log output: {0}")]
    InitializationFailed(String),
    #[error("KEEL_LOG_LEVEL={0:?} is not a valid filter directive")]
    InvalidLogLevel(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_env_var() {
        assert_eq!(
            LoggerError::InvalidFormat("xml".into()).to_string(),
            r#"KEEL_LOG_FORMAT="xml" is not one of text, json or journald"#
        );
        assert_eq!(
            LoggerError::InvalidLogLevel("loud".into()).to_string(),
            r#"KEEL_LOG_LEVEL="loud" is not a valid filter directive"#
        );
    }
}
