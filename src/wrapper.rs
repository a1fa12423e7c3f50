pub mod rust_log {
    use std::borrow::Cow;

    use crate::payload::FIELD_LOG_MESSAGE;
    use crate::record::{FieldValue, LogRecord};
    use crate::writer::{Emission, RecordWriter};

    /// Sends every field of `record` as a key/value pair through the `log`
    /// facade. The message is the record's `logMessage`.
    pub fn log(level: log::Level, target: &str, module_path: &'static str, record: &LogRecord) {
        let kvs: Vec<(&str, log::kv::Value)> = record
            .iter()
            .map(|(k, v)| (k, to_kv(v)))
            .collect();
        let kvs = kvs.as_slice();

        let message = record
            .get(FIELD_LOG_MESSAGE)
            .map(|v| v.to_string())
            .unwrap_or_default();

        // Built and logged in one statement so the formatted arguments
        // outlive the record.
        log::logger().log(
            &log::Record::builder()
                .args(format_args!("{message}"))
                .level(level)
                .target(target)
                .module_path_static(Some(module_path))
                .key_values(&kvs)
                .build(),
        );
    }

    fn to_kv(value: &FieldValue) -> log::kv::Value<'_> {
        match value {
            FieldValue::Null => log::kv::Value::null(),
            FieldValue::Bool(v) => log::kv::Value::from(*v),
            FieldValue::Int(v) => log::kv::Value::from(*v),
            FieldValue::UInt(v) => log::kv::Value::from(*v),
            FieldValue::Float(v) => log::kv::Value::from(*v),
            FieldValue::Str(v) => log::kv::Value::from(v.as_str()),
        }
    }

    /// [`RecordWriter`] that forwards records to the installed `log` logger
    /// instead of writing to the standard streams.
    ///
    /// Failed invocations are logged at `Error`, successful ones at the
    /// effective severity. `Disabled` records are dropped.
    #[derive(Debug, Clone)]
    pub struct LogForwarder {
        target: Cow<'static, str>,
    }

    impl LogForwarder {
        pub fn new(target: impl Into<Cow<'static, str>>) -> Self {
            LogForwarder {
                target: target.into(),
            }
        }
    }

    impl Default for LogForwarder {
        fn default() -> Self {
            LogForwarder::new(crate::config::DEFAULT_LOG_TARGET)
        }
    }

    impl RecordWriter for LogForwarder {
        fn write(&self, emission: &Emission<'_>) {
            if let Some(level) = emission.severity.to_level() {
                log(level, &self.target, module_path!(), emission.record);
            }
        }
    }
}
