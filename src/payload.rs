use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    time::Duration,
};

use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{
    config::{LoggerConfig, has_text},
    context,
    customizer::StructuredLogCustomizer,
    invocation::{FailureDetail, InvocationDescriptor, Outcome},
    record::LogRecord,
    severity::Severity,
};

pub const FIELD_LOG_LEVEL: &str = "logLevel";
pub const FIELD_API_ID: &str = "apiId";
pub const FIELD_HTTP_STATUS_CODE: &str = "httpStatusCode";
pub const FIELD_INTERNAL_TRANSACTION_ID: &str = "internalTransactionId";
pub const FIELD_LOG_MESSAGE: &str = "logMessage";
pub const FIELD_LOG_POINT: &str = "logPoint";
pub const FIELD_LOG_TIMESTAMP: &str = "logTimestamp";
pub const FIELD_PROCESS_TIME: &str = "processTime";
pub const FIELD_TRANSACTION_ID: &str = "transactionId";
pub const FIELD_ERROR: &str = "error";
pub const FIELD_LOG_EXCEPTION: &str = "logException";

const UNKNOWN_API_ID: &str = "unknown";

/// Assembles the ordered record for one finished invocation and runs the
/// customizer chain over it.
#[derive(Clone)]
pub struct PayloadBuilder {
    config: Arc<LoggerConfig>,
    customizers: Arc<[Box<dyn StructuredLogCustomizer>]>,
}

impl PayloadBuilder {
    pub fn new(config: Arc<LoggerConfig>, customizers: Vec<Box<dyn StructuredLogCustomizer>>) -> Self {
        PayloadBuilder {
            config,
            customizers: customizers.into(),
        }
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    pub fn customizers(&self) -> usize {
        self.customizers.len()
    }

    /// `apiId` for an invocation: the configured override, else the short
    /// name of the declaring scope, else `"unknown"`.
    pub fn resolve_api_id(&self, short_scope_name: Option<&str>) -> String {
        self.config
            .api_id()
            .or(short_scope_name)
            .unwrap_or(UNKNOWN_API_ID)
            .to_string()
    }

    pub fn build(
        &self,
        descriptor: &InvocationDescriptor<'_>,
        duration: Duration,
        severity: Severity,
    ) -> LogRecord {
        let outcome = descriptor.outcome();
        let failure = descriptor.failure();
        let api_id = descriptor.api_id();
        let operation = descriptor.operation().to_lowercase();

        let (status, verb, point) = match outcome {
            Outcome::Success => (self.config.success_status_code(), "Completed", "End"),
            Outcome::Failure => (self.config.error_status_code(), "Failed", "Error"),
        };

        let mut record = LogRecord::new();
        record.insert(FIELD_LOG_LEVEL, severity.as_str());
        record.insert(FIELD_API_ID, api_id);
        record.insert(FIELD_HTTP_STATUS_CODE, status);
        record.insert(FIELD_INTERNAL_TRANSACTION_ID, self.internal_transaction_id());
        record.insert(FIELD_LOG_MESSAGE, format!("{api_id}-{operation} {verb}"));
        record.insert(FIELD_LOG_POINT, format!("{api_id}-{operation}-{point}"));
        record.insert(FIELD_LOG_TIMESTAMP, timestamp());
        record.insert(FIELD_PROCESS_TIME, duration.as_millis() as u64);
        record.insert(FIELD_TRANSACTION_ID, self.transaction_id());

        if let Some(FailureDetail { message, trace }) = failure {
            record.insert(FIELD_ERROR, message.as_deref());
            record.insert(FIELD_LOG_EXCEPTION, trace.as_str());
        }

        self.customize(&mut record, descriptor, duration, outcome);
        record
    }

    fn customize(
        &self,
        record: &mut LogRecord,
        descriptor: &InvocationDescriptor<'_>,
        duration: Duration,
        outcome: Outcome,
    ) {
        for customizer in self.customizers.iter() {
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                customizer.customize(record, descriptor, duration, outcome)
            }));

            let message = match result {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err.to_string(),
                Err(payload) => FailureDetail::from_panic(payload.as_ref())
                    .message
                    .unwrap_or_else(|| "panicked".to_string()),
            };

            log::warn!(
                target: self.config.log_target(),
                "StructuredLogCustomizer [{}] failed: {}",
                customizer.name(),
                message
            );
        }
    }

    /// Transaction id key, falling back to the correlation id.
    fn transaction_id(&self) -> Option<String> {
        context::get(self.config.transaction_id_key())
            .filter(|id| has_text(id))
            .or_else(|| context::get(self.config.correlation_id_key()))
    }

    /// Internal transaction id key, falling back to [`Self::transaction_id`].
    fn internal_transaction_id(&self) -> Option<String> {
        context::get(self.config.internal_transaction_id_key())
            .filter(|id| has_text(id))
            .or_else(|| self.transaction_id())
    }
}

/// Current instant with the local offset when it can be determined, UTC
/// otherwise.
fn timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(&Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}
