use std::{
    any::Any,
    fmt,
    future::Future,
    panic::{self, AssertUnwindSafe},
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::{Duration, Instant},
};

use pin_project_lite::pin_project;

use crate::config::LoggerConfig;
use crate::customizer::StructuredLogCustomizer;
use crate::invocation::{FailureDetail, Invocation, InvocationDescriptor};
use crate::payload::PayloadBuilder;
use crate::render::render;
use crate::severity::{DefaultProbe, SeverityGate, SeverityProbe};
use crate::writer::{Emission, RecordWriter, StdStreams, Stream};

/// Wraps units of work and emits one structured record per invocation.
///
/// Every call is timed; on completion the severity gate decides whether a
/// record is written. Successful calls go to stdout at the configured
/// severity, failures to stderr at `error`. The wrapped call's own result
/// or failure is always handed back untouched: a returned `Err` is returned
/// as is and a panic is resumed with its original payload. Nothing that goes
/// wrong while logging reaches the caller.
///
/// Panics raised by a customizer, probe or writer are contained, but the
/// process panic hook still runs first and, with the default hook, prints
/// to stderr next to the failure records.
///
/// `MethodLogger` is cheap to clone and holds no per-invocation state.
///
/// # Examples
/// ```rust
/// use method_slogger::{Invocation, LoggerConfig, MethodLogger};
///
/// struct InventoryService;
///
/// let logger = MethodLogger::new(LoggerConfig::default().with_api_id("Inventory"));
///
/// let reserved: Result<u32, std::io::Error> =
///     logger.intercept(Invocation::of::<InventoryService>("reserve"), || Ok(3));
/// assert_eq!(reserved.unwrap(), 3);
/// ```
#[derive(Clone)]
pub struct MethodLogger(Arc<Inner>);

struct Inner {
    config: Arc<LoggerConfig>,
    payload: PayloadBuilder,
    probe: Box<dyn SeverityProbe>,
    writer: Box<dyn RecordWriter>,
}

impl MethodLogger {
    /// Logger with no customizers, writing to the standard streams. Failures
    /// are always written; success levels are probed through the `log` facade.
    pub fn new(config: LoggerConfig) -> MethodLogger {
        MethodLogger::builder(config).build()
    }

    pub fn builder(config: LoggerConfig) -> MethodLoggerBuilder {
        MethodLoggerBuilder {
            config,
            customizers: Vec::new(),
            probe: None,
            writer: None,
        }
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.0.config
    }

    /// Run `work`, log its outcome and return exactly what it returned.
    ///
    /// A panic inside `work` is logged as a failure and then resumed.
    /// Customizers can downcast the returned value through
    /// [`InvocationDescriptor::result`].
    pub fn intercept<T, E, F>(&self, invocation: Invocation, work: F) -> Result<T, E>
    where
        T: Any,
        E: fmt::Display + fmt::Debug,
        F: FnOnce() -> Result<T, E>,
    {
        let (result, elapsed) = timed(work);
        match result {
            Ok(Ok(value)) => {
                self.complete(&invocation, Some(&value), None, elapsed);
                Ok(value)
            }
            Ok(Err(err)) => Err(self.failed(&invocation, err, elapsed)),
            Err(payload) => self.panicked(&invocation, payload, elapsed),
        }
    }

    /// Same as [`intercept`](Self::intercept) for work whose result borrows
    /// from its surroundings. Customizers see no result.
    pub fn intercept_borrowed<T, E, F>(&self, invocation: Invocation, work: F) -> Result<T, E>
    where
        E: fmt::Display + fmt::Debug,
        F: FnOnce() -> Result<T, E>,
    {
        let (result, elapsed) = timed(work);
        match result {
            Ok(Ok(value)) => {
                self.complete(&invocation, None, None, elapsed);
                Ok(value)
            }
            Ok(Err(err)) => Err(self.failed(&invocation, err, elapsed)),
            Err(payload) => self.panicked(&invocation, payload, elapsed),
        }
    }

    /// Asynchronous form of [`intercept`](Self::intercept).
    ///
    /// The timer starts at the first poll and stops when `fut` resolves.
    pub fn intercept_future<F, T, E>(&self, invocation: Invocation, fut: F) -> Intercepted<F>
    where
        F: Future<Output = Result<T, E>>,
        T: Any,
        E: fmt::Display + fmt::Debug,
    {
        Intercepted {
            fut,
            logger: self.clone(),
            invocation: Some(invocation),
            start: None,
        }
    }

    fn failed<E: fmt::Display + fmt::Debug>(&self, invocation: &Invocation, err: E, elapsed: Duration) -> E {
        let failure = FailureDetail::from_error(std::any::type_name::<E>(), &err);
        self.complete(invocation, None, Some(&failure), elapsed);
        err
    }

    fn panicked(&self, invocation: &Invocation, payload: Box<dyn Any + Send>, elapsed: Duration) -> ! {
        let failure = FailureDetail::from_panic(payload.as_ref());
        self.complete(invocation, None, Some(&failure), elapsed);
        panic::resume_unwind(payload)
    }

    /// Gate, build, render and write. Never unwinds into the caller.
    fn complete(
        &self,
        invocation: &Invocation,
        result: Option<&dyn Any>,
        failure: Option<&FailureDetail>,
        elapsed: Duration,
    ) {
        let emitted = panic::catch_unwind(AssertUnwindSafe(|| {
            self.emit(invocation, result, failure, elapsed)
        }));

        if let Err(payload) = emitted {
            let detail = FailureDetail::from_panic(payload.as_ref());
            log::warn!(
                target: self.0.config.log_target(),
                "Structured logging for {}::{} failed: {}",
                invocation.declaring_scope(),
                invocation.operation(),
                detail.message.as_deref().unwrap_or("panicked")
            );
        }
    }

    fn emit(
        &self,
        invocation: &Invocation,
        result: Option<&dyn Any>,
        failure: Option<&FailureDetail>,
        elapsed: Duration,
    ) {
        let inner = &self.0;
        let decision = SeverityGate::decide(inner.config.severity(), failure.is_some(), &*inner.probe);
        if !decision.emit {
            return;
        }

        let descriptor = InvocationDescriptor {
            invocation,
            api_id: inner.payload.resolve_api_id(invocation.short_scope_name()),
            result,
            failure,
        };
        let record = inner.payload.build(&descriptor, elapsed, decision.severity);
        let line = render(&record);

        inner.writer.write(&Emission {
            stream: if failure.is_some() {
                Stream::Stderr
            } else {
                Stream::Stdout
            },
            severity: decision.severity,
            record: &record,
            line: &line,
        });
    }
}

fn timed<T, E, F>(work: F) -> (std::thread::Result<Result<T, E>>, Duration)
where
    F: FnOnce() -> Result<T, E>,
{
    let start = Instant::now();
    let result = panic::catch_unwind(AssertUnwindSafe(work));
    (result, start.elapsed())
}

impl Default for MethodLogger {
    fn default() -> Self {
        MethodLogger::new(LoggerConfig::default())
    }
}

impl fmt::Debug for MethodLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodLogger")
            .field("config", &self.0.config)
            .field("customizers", &self.0.payload.customizers())
            .finish_non_exhaustive()
    }
}

/// Builder for [`MethodLogger`].
pub struct MethodLoggerBuilder {
    config: LoggerConfig,
    customizers: Vec<Box<dyn StructuredLogCustomizer>>,
    probe: Option<Box<dyn SeverityProbe>>,
    writer: Option<Box<dyn RecordWriter>>,
}

impl MethodLoggerBuilder {
    /// Append a customizer; customizers run in the order they are added.
    pub fn customizer(mut self, customizer: impl StructuredLogCustomizer + 'static) -> Self {
        self.customizers.push(Box::new(customizer));
        self
    }

    /// Replace the level probe. Defaults to [`DefaultProbe`] on the
    /// configured log target; use [`LogProbe`](crate::LogProbe) to gate
    /// failures through the `log` facade as well.
    pub fn probe(mut self, probe: impl SeverityProbe + 'static) -> Self {
        self.probe = Some(Box::new(probe));
        self
    }

    /// Replace the output. Defaults to [`StdStreams`].
    pub fn writer(mut self, writer: impl RecordWriter + 'static) -> Self {
        self.writer = Some(Box::new(writer));
        self
    }

    pub fn build(self) -> MethodLogger {
        let config = Arc::new(self.config);
        let probe = self
            .probe
            .unwrap_or_else(|| Box::new(DefaultProbe::new(config.log_target())));
        let writer = self.writer.unwrap_or_else(|| Box::new(StdStreams));

        MethodLogger(Arc::new(Inner {
            payload: PayloadBuilder::new(Arc::clone(&config), self.customizers),
            config,
            probe,
            writer,
        }))
    }
}

pin_project! {
    /// Future returned by [`MethodLogger::intercept_future`].
    pub struct Intercepted<F> {
        #[pin]
        fut: F,
        logger: MethodLogger,
        invocation: Option<Invocation>,
        start: Option<Instant>,
    }
}

impl<F, T, E> Future for Intercepted<F>
where
    F: Future<Output = Result<T, E>>,
    T: Any,
    E: fmt::Display + fmt::Debug,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let start = *this.start.get_or_insert_with(Instant::now);

        let polled = panic::catch_unwind(AssertUnwindSafe(|| this.fut.poll(cx)));

        let output = match polled {
            Ok(Poll::Pending) => return Poll::Pending,
            Ok(Poll::Ready(output)) => output,
            Err(payload) => match this.invocation.take() {
                Some(invocation) => this.logger.panicked(&invocation, payload, start.elapsed()),
                None => panic::resume_unwind(payload),
            },
        };

        let elapsed = start.elapsed();
        // Polling again after completion is the inner future's problem, not
        // a second record.
        if let Some(invocation) = this.invocation.take() {
            match &output {
                Ok(value) => this.logger.complete(&invocation, Some(value), None, elapsed),
                Err(err) => {
                    let failure = FailureDetail::from_error(std::any::type_name::<E>(), err);
                    this.logger.complete(&invocation, None, Some(&failure), elapsed);
                }
            }
        }

        Poll::Ready(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context;
    use crate::customizer::{CustomizerError, from_fn};
    use crate::severity::{Severity, StaticProbe};
    use crate::writer::MemoryWriter;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn logger_with(config: LoggerConfig, probe: StaticProbe) -> (MethodLogger, Arc<MemoryWriter>) {
        let writer = Arc::new(MemoryWriter::new());
        let logger = MethodLogger::builder(config)
            .probe(probe)
            .writer(Arc::clone(&writer))
            .build();
        (logger, writer)
    }

    #[derive(Debug, PartialEq)]
    struct Boom(&'static str);

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.0)
        }
    }

    impl std::error::Error for Boom {}

    #[test]
    fn test_logs_structured_payload_with_customizer_fields() {
        let config = LoggerConfig::default()
            .with_api_id("SendNotification")
            .with_transaction_id_key("transactionId")
            .with_internal_transaction_id_key("internalTxId");
        let writer = Arc::new(MemoryWriter::new());
        let logger = MethodLogger::builder(config)
            .probe(StaticProbe(Severity::Info))
            .writer(Arc::clone(&writer))
            .customizer(from_fn(|record, _, _, _| {
                record.insert("tenantId", "t-1");
                record.insert("region", "apac");
                Ok(())
            }))
            .build();

        let mut map = context::ContextMap::new();
        map.insert("correlationId".to_string(), "corr-123".to_string());
        map.insert("transactionId".to_string(), "tx-123".to_string());
        map.insert("internalTxId".to_string(), "internal-456".to_string());

        let result = context::with_context(&mut map, || {
            logger.intercept(
                Invocation::new("com.example.Demo", "doWork").with_arg("arg1"),
                || Ok::<_, Boom>("ok"),
            )
        });
        assert_eq!(result, Ok("ok"));

        let lines = writer.stream(Stream::Stdout);
        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert!(line.starts_with(r#"{ "logLevel": "info", "apiId": "SendNotification", "httpStatusCode": 200, "internalTransactionId": "internal-456", "logMessage": "SendNotification-dowork Completed", "logPoint": "SendNotification-dowork-End", "logTimestamp": ""#));
        assert!(line.contains(r#""processTime": "#));
        assert!(line.ends_with(r#""transactionId": "tx-123", "tenantId": "t-1", "region": "apac" }"#));
        assert!(writer.stream(Stream::Stderr).is_empty());
    }

    #[test]
    fn test_logs_error_payload_and_returns_original_error() {
        let (logger, writer) = logger_with(LoggerConfig::default(), StaticProbe(Severity::Info));

        let result: Result<(), Boom> =
            logger.intercept(Invocation::new("com.example.Demo", "fails"), || Err(Boom("boom")));
        assert_eq!(result, Err(Boom("boom")));

        assert!(writer.stream(Stream::Stdout).is_empty());
        let lines = writer.stream(Stream::Stderr);
        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert!(line.contains(r#""logLevel": "error""#));
        assert!(line.contains(r#""logMessage": "Demo-fails Failed""#));
        assert!(line.contains(r#""logPoint": "Demo-fails-Error""#));
        assert!(line.contains(r#""httpStatusCode": 500"#));
        assert!(line.contains(r#""error": "boom""#));
        assert!(line.contains(r#"tests::Boom: boom\nBoom(\"boom\")""#));
        assert!(line.contains(r#""logException": ""#));
    }

    #[test]
    fn test_error_escalates_regardless_of_configured_severity() {
        let config = LoggerConfig::default()
            .with_severity(Severity::Disabled)
            .with_error_status_code(503)
            .with_transaction_id_key("txid")
            .with_internal_transaction_id_key("intid");
        let (logger, writer) = logger_with(config, StaticProbe(Severity::Trace));

        let _tx = context::scope("txid", "tx-1");
        let _int = context::scope("intid", "int-1");
        let result: Result<(), Boom> =
            logger.intercept(Invocation::new("com.example.Demo", "fails"), || Err(Boom("boom")));
        assert!(result.is_err());

        let lines = writer.stream(Stream::Stderr);
        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert!(line.contains(r#""httpStatusCode": 503"#));
        assert!(line.contains(r#""transactionId": "tx-1""#));
        assert!(line.contains(r#""internalTransactionId": "int-1""#));
        assert!(line.contains(r#""error": "boom""#));
        assert!(line.contains(r#""logLevel": "error""#));
    }

    #[test]
    fn test_logs_at_configured_debug_level_when_enabled() {
        let config = LoggerConfig::default()
            .with_api_id("DebugApi")
            .with_severity(Severity::Debug);

        let (logger, writer) = logger_with(config.clone(), StaticProbe(Severity::Debug));
        logger
            .intercept(Invocation::new("com.example.Demo", "debuggable"), || Ok::<_, Boom>(()))
            .unwrap();
        let lines = writer.stream(Stream::Stdout);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains(r#""logLevel": "debug""#));
        assert!(lines[0].contains(r#""logPoint": "DebugApi-debuggable-End""#));

        let (logger, writer) = logger_with(config, StaticProbe(Severity::Info));
        logger
            .intercept(Invocation::new("com.example.Demo", "debuggable"), || Ok::<_, Boom>(()))
            .unwrap();
        assert!(writer.lines().is_empty());
    }

    #[test]
    fn test_falls_back_to_scope_name_and_transaction_ids() {
        let config = LoggerConfig::default().with_success_status_code(201);
        let (logger, writer) = logger_with(config, StaticProbe(Severity::Info));

        let _corr = context::scope("correlationId", "corr-xyz");
        logger
            .intercept(Invocation::new("com.example.InventoryService", "process"), || {
                Ok::<_, Boom>("done")
            })
            .unwrap();

        let line = &writer.stream(Stream::Stdout)[0];
        assert!(line.contains(r#""apiId": "InventoryService""#));
        assert!(line.contains(r#""logMessage": "InventoryService-process Completed""#));
        assert!(line.contains(r#""logPoint": "InventoryService-process-End""#));
        assert!(line.contains(r#""httpStatusCode": 201"#));
        assert!(line.contains(r#""transactionId": "corr-xyz""#));
        assert!(line.contains(r#""internalTransactionId": "corr-xyz""#));
    }

    #[test]
    fn test_missing_context_renders_null() {
        let (logger, writer) = logger_with(LoggerConfig::default(), StaticProbe(Severity::Info));
        logger
            .intercept(Invocation::new("", "ping"), || Ok::<_, Boom>(()))
            .unwrap();

        let line = &writer.stream(Stream::Stdout)[0];
        assert!(line.contains(r#""apiId": "unknown""#));
        assert!(line.contains(r#""internalTransactionId": null"#));
        assert!(line.contains(r#""transactionId": null"#));
    }

    #[test]
    fn test_panic_is_logged_and_resumed() {
        let (logger, writer) = logger_with(LoggerConfig::default(), StaticProbe(Severity::Info));

        let caught = panic::catch_unwind(AssertUnwindSafe(|| {
            let _: Result<(), Boom> =
                logger.intercept(Invocation::new("Demo", "explode"), || panic!("kaboom"));
        }));

        let payload = caught.unwrap_err();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"kaboom"));

        let lines = writer.stream(Stream::Stderr);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains(r#""error": "kaboom""#));
        assert!(lines[0].contains(r#""logException": "panic: kaboom""#));
    }

    #[test]
    fn test_failing_customizer_does_not_stop_emission() {
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_later = Arc::clone(&ran);
        let writer = Arc::new(MemoryWriter::new());

        let logger = MethodLogger::builder(LoggerConfig::default())
            .probe(StaticProbe(Severity::Info))
            .writer(Arc::clone(&writer))
            .customizer(from_fn(|_, _, _, _| Err(CustomizerError::from("broken"))))
            .customizer(from_fn(move |record, _, _, _| {
                ran_later.fetch_add(1, Ordering::SeqCst);
                record.insert("after", 1);
                Ok(())
            }))
            .build();

        let result = logger.intercept(Invocation::new("Demo", "work"), || Ok::<_, Boom>(7));
        assert_eq!(result, Ok(7));
        assert_eq!(ran.load(Ordering::SeqCst), 1);

        let line = &writer.stream(Stream::Stdout)[0];
        assert!(line.contains(r#""logMessage": "Demo-work Completed""#));
        assert!(line.ends_with(r#""after": 1 }"#));
    }

    #[test]
    fn test_customizer_sees_result() {
        let writer = Arc::new(MemoryWriter::new());
        let logger = MethodLogger::builder(LoggerConfig::default())
            .probe(StaticProbe(Severity::Info))
            .writer(Arc::clone(&writer))
            .customizer(from_fn(|record, invocation, _, _| {
                let items = invocation
                    .result()
                    .and_then(|r| r.downcast_ref::<Vec<u32>>())
                    .map(Vec::len);
                record.insert("items", items);
                Ok(())
            }))
            .build();

        logger
            .intercept(Invocation::new("Demo", "list"), || Ok::<_, Boom>(vec![1u32, 2, 3]))
            .unwrap();

        assert!(writer.stream(Stream::Stdout)[0].ends_with(r#""items": 3 }"#));
    }

    #[test]
    fn test_panicking_probe_is_contained() {
        let writer = Arc::new(MemoryWriter::new());
        let logger = MethodLogger::builder(LoggerConfig::default())
            .probe(|_: Severity| -> bool { panic!("probe failure") })
            .writer(Arc::clone(&writer))
            .build();

        let result = logger.intercept(Invocation::new("Demo", "work"), || Ok::<_, Boom>(1));
        assert_eq!(result, Ok(1));
        assert!(writer.lines().is_empty());
    }

    #[test]
    fn test_field_order_is_stable() {
        let (logger, writer) = logger_with(LoggerConfig::default(), StaticProbe(Severity::Info));
        for _ in 0..3 {
            logger
                .intercept(Invocation::new("Demo", "work"), || Ok::<_, Boom>(()))
                .unwrap();
        }

        fn keys(line: &str) -> Vec<&str> {
            line.match_indices("\": ")
                .map(|(idx, _)| {
                    let start = line[..idx].rfind('"').map_or(0, |i| i + 1);
                    &line[start..idx]
                })
                .collect()
        }

        let lines = writer.lines();
        let keys: Vec<Vec<&str>> = lines.iter().map(|(_, line)| keys(line)).collect();
        assert_eq!(keys.len(), 3);
        assert_eq!(
            keys[0],
            vec![
                "logLevel",
                "apiId",
                "httpStatusCode",
                "internalTransactionId",
                "logMessage",
                "logPoint",
                "logTimestamp",
                "processTime",
                "transactionId",
            ]
        );
        assert!(keys.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_default_probe_writes_failures_without_log_backend() {
        let writer = Arc::new(MemoryWriter::new());
        let logger = MethodLogger::builder(LoggerConfig::default())
            .writer(Arc::clone(&writer))
            .build();

        let result: Result<(), Boom> =
            logger.intercept(Invocation::new("Demo", "fails"), || Err(Boom("boom")));
        assert_eq!(result, Err(Boom("boom")));

        let lines = writer.stream(Stream::Stderr);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains(r#""logLevel": "error""#));
        assert!(lines[0].contains(r#""error": "boom""#));
    }

    #[test]
    fn test_intercept_borrowed_result() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in = Arc::clone(&seen);
        let writer = Arc::new(MemoryWriter::new());
        let logger = MethodLogger::builder(LoggerConfig::default())
            .probe(StaticProbe(Severity::Info))
            .writer(Arc::clone(&writer))
            .customizer(from_fn(move |_, invocation, _, _| {
                if invocation.result().is_none() {
                    seen_in.fetch_add(1, Ordering::SeqCst);
                }
                Ok(())
            }))
            .build();

        let inventory = String::from("sku-1,sku-2");
        let first = logger.intercept_borrowed(Invocation::new("Demo", "first"), || {
            inventory.split(',').next().ok_or(Boom("empty"))
        });
        assert_eq!(first, Ok("sku-1"));

        let missing: Result<&str, Boom> =
            logger.intercept_borrowed(Invocation::new("Demo", "missing"), || Err(Boom("empty")));
        assert_eq!(missing, Err(Boom("empty")));

        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert_eq!(writer.stream(Stream::Stdout).len(), 1);
        assert_eq!(writer.stream(Stream::Stderr).len(), 1);
    }

    #[tokio::test]
    async fn test_intercept_future() {
        let (logger, writer) = logger_with(LoggerConfig::default(), StaticProbe(Severity::Info));

        let ok = logger
            .intercept_future(Invocation::new("Demo", "fetch"), async {
                tokio::task::yield_now().await;
                Ok::<_, Boom>(5)
            })
            .await;
        assert_eq!(ok, Ok(5));

        let err = logger
            .intercept_future(Invocation::new("Demo", "fetch"), async {
                Err::<u8, _>(Boom("late"))
            })
            .await;
        assert_eq!(err, Err(Boom("late")));

        let lines = writer.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].0, Stream::Stdout);
        assert!(lines[0].1.contains(r#""logMessage": "Demo-fetch Completed""#));
        assert_eq!(lines[1].0, Stream::Stderr);
        assert!(lines[1].1.contains(r#""error": "late""#));
    }
}
