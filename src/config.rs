use std::{env, str::FromStr};

use crate::severity::{ParseSeverityError, Severity};

pub const DEFAULT_CORRELATION_ID_HEADER: &str = "X-Correlation-Id";
pub const DEFAULT_CORRELATION_ID_KEY: &str = "correlationId";
pub const DEFAULT_LOG_TARGET: &str = "method_slogger::logger";

/// Environment variables read by [`LoggerConfig::from_env`].
pub const CORRELATION_ID_HEADER_ENV: &str = "COMMON_LOGGER_CORRELATION_ID_HEADER";
pub const CORRELATION_ID_KEY_ENV: &str = "COMMON_LOGGER_CORRELATION_ID_KEY";
pub const LOG_LEVEL_ENV: &str = "COMMON_LOGGER_LOG_LEVEL";
pub const API_ID_ENV: &str = "COMMON_LOGGER_API_ID";
pub const SUCCESS_HTTP_STATUS_CODE_ENV: &str = "COMMON_LOGGER_SUCCESS_HTTP_STATUS_CODE";
pub const ERROR_HTTP_STATUS_CODE_ENV: &str = "COMMON_LOGGER_ERROR_HTTP_STATUS_CODE";
pub const TRANSACTION_ID_KEY_ENV: &str = "COMMON_LOGGER_TRANSACTION_ID_KEY";
pub const INTERNAL_TRANSACTION_ID_KEY_ENV: &str = "COMMON_LOGGER_INTERNAL_TRANSACTION_ID_KEY";
pub const LOG_TARGET_ENV: &str = "COMMON_LOGGER_LOG_TARGET";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid header name `{0}`")]
    InvalidHeaderName(String),

    #[error("{var}: {source}")]
    InvalidSeverity {
        var: &'static str,
        #[source]
        source: ParseSeverityError,
    },

    #[error("{var}: `{value}` is not a valid status code")]
    InvalidStatusCode { var: &'static str, value: String },
}

/// Settings shared by the interception engine and the correlation id
/// middleware.
///
/// Transaction keys left unset fall back to the correlation id key when they
/// are read, so changing the correlation key later still moves them along.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerConfig {
    correlation_id_header: String,
    correlation_id_key: String,
    severity: Severity,
    api_id: String,
    success_status_code: u16,
    error_status_code: u16,
    transaction_id_key: Option<String>,
    internal_transaction_id_key: Option<String>,
    log_target: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        LoggerConfig {
            correlation_id_header: DEFAULT_CORRELATION_ID_HEADER.to_string(),
            correlation_id_key: DEFAULT_CORRELATION_ID_KEY.to_string(),
            severity: Severity::Info,
            api_id: String::new(),
            success_status_code: 200,
            error_status_code: 500,
            transaction_id_key: None,
            internal_transaction_id_key: None,
            log_target: DEFAULT_LOG_TARGET.to_string(),
        }
    }
}

impl LoggerConfig {
    pub fn new() -> Self {
        LoggerConfig::default()
    }

    /// Defaults overridden by any `COMMON_LOGGER_*` variables that are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = LoggerConfig::default();

        if let Some(v) = lookup(CORRELATION_ID_HEADER_ENV) {
            config = config.with_correlation_id_header(v);
        }
        if let Some(v) = lookup(CORRELATION_ID_KEY_ENV) {
            config = config.with_correlation_id_key(v);
        }
        if let Some(v) = lookup(LOG_LEVEL_ENV) {
            let severity = v.parse().map_err(|source| ConfigError::InvalidSeverity {
                var: LOG_LEVEL_ENV,
                source,
            })?;
            config = config.with_severity(severity);
        }
        if let Some(v) = lookup(API_ID_ENV) {
            config = config.with_api_id(v);
        }
        if let Some(v) = lookup(SUCCESS_HTTP_STATUS_CODE_ENV) {
            config = config.with_success_status_code(parse_status(SUCCESS_HTTP_STATUS_CODE_ENV, &v)?);
        }
        if let Some(v) = lookup(ERROR_HTTP_STATUS_CODE_ENV) {
            config = config.with_error_status_code(parse_status(ERROR_HTTP_STATUS_CODE_ENV, &v)?);
        }
        if let Some(v) = lookup(TRANSACTION_ID_KEY_ENV) {
            config = config.with_transaction_id_key(v);
        }
        if let Some(v) = lookup(INTERNAL_TRANSACTION_ID_KEY_ENV) {
            config = config.with_internal_transaction_id_key(v);
        }
        if let Some(v) = lookup(LOG_TARGET_ENV) {
            config = config.with_log_target(v);
        }

        Ok(config)
    }

    pub fn with_correlation_id_header(mut self, header: impl Into<String>) -> Self {
        self.correlation_id_header = header.into();
        self
    }

    pub fn with_correlation_id_key(mut self, key: impl Into<String>) -> Self {
        self.correlation_id_key = key.into();
        self
    }

    /// Severity used for successful invocations.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Fixed `apiId` for every record. An empty string means "derive it from
    /// the declaring scope".
    pub fn with_api_id(mut self, api_id: impl Into<String>) -> Self {
        self.api_id = api_id.into();
        self
    }

    pub fn with_success_status_code(mut self, code: u16) -> Self {
        self.success_status_code = code;
        self
    }

    pub fn with_error_status_code(mut self, code: u16) -> Self {
        self.error_status_code = code;
        self
    }

    pub fn with_transaction_id_key(mut self, key: impl Into<String>) -> Self {
        self.transaction_id_key = Some(key.into());
        self
    }

    pub fn with_internal_transaction_id_key(mut self, key: impl Into<String>) -> Self {
        self.internal_transaction_id_key = Some(key.into());
        self
    }

    /// Sets the `log` target used for level probing and diagnostics.
    pub fn with_log_target(mut self, target: impl Into<String>) -> Self {
        self.log_target = target.into();
        self
    }

    pub fn correlation_id_header(&self) -> &str {
        &self.correlation_id_header
    }

    pub fn correlation_id_key(&self) -> &str {
        &self.correlation_id_key
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Configured api id, `None` when unset or blank.
    pub fn api_id(&self) -> Option<&str> {
        has_text(&self.api_id).then_some(self.api_id.as_str())
    }

    pub fn success_status_code(&self) -> u16 {
        self.success_status_code
    }

    pub fn error_status_code(&self) -> u16 {
        self.error_status_code
    }

    pub fn transaction_id_key(&self) -> &str {
        self.transaction_id_key
            .as_deref()
            .unwrap_or(&self.correlation_id_key)
    }

    pub fn internal_transaction_id_key(&self) -> &str {
        self.internal_transaction_id_key
            .as_deref()
            .unwrap_or(&self.correlation_id_key)
    }

    pub fn log_target(&self) -> &str {
        &self.log_target
    }
}

fn parse_status(var: &'static str, value: &str) -> Result<u16, ConfigError> {
    u16::from_str(value.trim()).map_err(|_| ConfigError::InvalidStatusCode {
        var,
        value: value.to_string(),
    })
}

/// Non-empty after trimming whitespace.
pub(crate) fn has_text(s: &str) -> bool {
    !s.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = LoggerConfig::default();
        assert_eq!(config.correlation_id_header(), "X-Correlation-Id");
        assert_eq!(config.correlation_id_key(), "correlationId");
        assert_eq!(config.severity(), Severity::Info);
        assert_eq!(config.api_id(), None);
        assert_eq!(config.success_status_code(), 200);
        assert_eq!(config.error_status_code(), 500);
        assert_eq!(config.transaction_id_key(), "correlationId");
        assert_eq!(config.internal_transaction_id_key(), "correlationId");
        assert_eq!(config.log_target(), DEFAULT_LOG_TARGET);
    }

    #[test]
    fn test_transaction_keys_follow_correlation_key() {
        let config = LoggerConfig::default().with_correlation_id_key("reqId");
        assert_eq!(config.transaction_id_key(), "reqId");
        assert_eq!(config.internal_transaction_id_key(), "reqId");

        let config = config.with_transaction_id_key("txid");
        assert_eq!(config.transaction_id_key(), "txid");
        assert_eq!(config.internal_transaction_id_key(), "reqId");
    }

    #[test]
    fn test_blank_api_id_is_unset() {
        assert_eq!(LoggerConfig::default().with_api_id("  ").api_id(), None);
        assert_eq!(
            LoggerConfig::default().with_api_id("Orders").api_id(),
            Some("Orders")
        );
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (LOG_LEVEL_ENV, "debug"),
            (API_ID_ENV, "Billing"),
            (ERROR_HTTP_STATUS_CODE_ENV, " 503 "),
            (INTERNAL_TRANSACTION_ID_KEY_ENV, "intid"),
        ]);
        let config = LoggerConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.severity(), Severity::Debug);
        assert_eq!(config.api_id(), Some("Billing"));
        assert_eq!(config.error_status_code(), 503);
        assert_eq!(config.success_status_code(), 200);
        assert_eq!(config.internal_transaction_id_key(), "intid");
        assert_eq!(config.transaction_id_key(), "correlationId");
    }

    #[test]
    fn test_from_lookup_errors() {
        let err = LoggerConfig::from_lookup(|k| (k == LOG_LEVEL_ENV).then(|| "loud".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSeverity { .. }));
        assert_eq!(err.to_string(), "COMMON_LOGGER_LOG_LEVEL: unknown severity `loud`");

        let err = LoggerConfig::from_lookup(|k| {
            (k == SUCCESS_HTTP_STATUS_CODE_ENV).then(|| "ok".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidStatusCode { .. }));
    }
}
