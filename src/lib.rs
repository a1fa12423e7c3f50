//! Structured method-level execution logger.
//! Wraps units of work and emits one machine-parseable record per invocation,
//! with timing, outcome, correlation identifiers and caller-supplied fields.
//!
//! # Examples:
//! ## Wrapping a call
//! ```rust
//! use method_slogger::{Invocation, LoggerConfig, MethodLogger};
//!
//! struct InventoryService;
//!
//! impl InventoryService {
//!     fn process(&self, logger: &MethodLogger, sku: &str) -> Result<u32, std::io::Error> {
//!         logger.intercept(
//!             Invocation::of::<Self>("process").with_arg(sku.to_string()),
//!             || Ok(12),
//!         )
//!     }
//! }
//!
//! let logger = MethodLogger::new(LoggerConfig::default());
//! assert_eq!(InventoryService.process(&logger, "sku-1").unwrap(), 12);
//! ```
//! With the level enabled, a line like this is written to stdout:
//! ```text
//! { "logLevel": "info", "apiId": "InventoryService", "httpStatusCode": 200, "internalTransactionId": "7b77f3f1-...", "logMessage": "InventoryService-process Completed", "logPoint": "InventoryService-process-End", "logTimestamp": "2025-05-29T18:51:00.123456Z", "processTime": 3, "transactionId": "7b77f3f1-..." }
//! ```
//! Failures are written to stderr at `error`, with `error` and `logException`
//! appended, and the original `Err` (or panic) is handed back unchanged.
//!
//! ## Correlation ids in actix-web
//! [`CorrelationId`] reads `X-Correlation-Id` (or generates one), keeps it in
//! the ambient [`context`] for the lifetime of the request and echoes it on
//! the response. Records emitted while the request is handled pick it up as
//! `transactionId` / `internalTransactionId`.
//! ```rust,no_run
//! use actix_web::{web, App, HttpServer};
//! use method_slogger::{CorrelationId, Invocation, LoggerConfig, MethodLogger};
//! use structured_logger::{Builder, async_json::new_writer};
//!
//! #[actix_web::main] // or #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     Builder::new()
//!         .with_target_writer("*", new_writer(tokio::io::stdout()))
//!         .init();
//!
//!     let config = LoggerConfig::from_env().expect("valid COMMON_LOGGER_* settings");
//!     let logger = MethodLogger::new(config.clone());
//!
//!     HttpServer::new(move || {
//!         let logger = logger.clone();
//!         App::new()
//!             .wrap(CorrelationId::new(&config).expect("valid header name"))
//!             .route(
//!                 "/",
//!                 web::get().to(move || {
//!                     let logger = logger.clone();
//!                     async move {
//!                         logger
//!                             .intercept_future(Invocation::new("Greeter", "hello"), async {
//!                                 Ok::<_, std::io::Error>("Hello world!")
//!                             })
//!                             .await
//!                     }
//!                 }),
//!             )
//!     })
//!     .bind("127.0.0.1:8080")?
//!     .run()
//!     .await
//! }
//! ```
//!
//! # Features
//! - Ordered structured records: `logLevel`, `apiId`, `httpStatusCode`,
//!   `internalTransactionId`, `logMessage`, `logPoint`, `logTimestamp`,
//!   `processTime`, `transactionId`, then `error` / `logException` on failure
//! - Level-aware gating probed at emission time through the `log` facade;
//!   failures are written even without a `log` backend
//! - Ambient per-request context with thread and per-future isolation
//! - Ordered customizer chain with isolated failures
//! - Correlation id middleware for actix-web (UUID v4 or v7)
//!
//! # Configuration
//!
//! [`LoggerConfig`] covers the correlation header and context key, success
//! severity, api id override, status codes and the transaction id keys.
//! Transaction keys that are not set fall back to the correlation key.
//!
//! ```rust
//! use method_slogger::{LoggerConfig, Severity};
//!
//! let config = LoggerConfig::default()
//!     .with_api_id("SendNotification")
//!     .with_severity(Severity::Debug)
//!     .with_error_status_code(503)
//!     .with_transaction_id_key("transactionId");
//! assert_eq!(config.internal_transaction_id_key(), "correlationId");
//! ```
//!
//! # Feature Flags
//!
//! - `uuid_v4` (default) - Generate correlation ids with UUIDv4
//! - `uuid_v7` - Use UUIDv7 instead of UUIDv4 for correlation ids

pub mod config;
pub mod context;
pub mod customizer;
mod invocation;
mod logger;
mod middleware;
pub mod payload;
mod record;
mod render;
mod severity;
mod wrapper;
pub mod writer;

pub use crate::config::{ConfigError, LoggerConfig};
pub use crate::customizer::{CustomizerError, StructuredLogCustomizer};
pub use crate::invocation::{
    Argument, FailureDetail, Invocation, InvocationDescriptor, Outcome,
};
pub use crate::logger::{Intercepted, MethodLogger, MethodLoggerBuilder};
pub use crate::middleware::{CorrelationId, CorrelationIdValue};
pub use crate::payload::PayloadBuilder;
pub use crate::record::{FieldValue, LogRecord};
pub use crate::render::render;
pub use crate::severity::{
    DefaultProbe, GateDecision, LogProbe, ParseSeverityError, Severity, SeverityGate, SeverityProbe,
    StaticProbe,
};
pub use crate::wrapper::rust_log;
