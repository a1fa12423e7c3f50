use std::{borrow::Cow, error::Error, time::Duration};

use crate::{
    invocation::{InvocationDescriptor, Outcome},
    record::LogRecord,
};

/// Error a customizer may report. It is logged and otherwise ignored.
pub type CustomizerError = Box<dyn Error + Send + Sync>;

/// Hook for adding or overriding fields of a record before it is emitted.
///
/// Customizers run in registration order and may overwrite any field,
/// including the built-in ones. A customizer that returns an error or panics
/// is reported with a warning; the remaining customizers still run and the
/// record is still emitted with whatever was written before the failure.
///
/// A panic is still reported by the process panic hook before it is
/// contained. With the default hook that message lands on stderr, the same
/// stream failure records go to; return an error instead of panicking, or
/// install a quieter hook with [`std::panic::set_hook`].
///
/// Closures with the same signature implement this trait; [`from_fn`] helps
/// the compiler infer their argument types.
///
/// # Examples
/// ```rust
/// use method_slogger::customizer::{from_fn, Named};
///
/// let tenant = Named::new(
///     "tenant",
///     from_fn(|record, _invocation, _duration, _outcome| {
///         record.insert("tenantId", "t-1");
///         Ok(())
///     }),
/// );
/// # let _ = tenant;
/// ```
pub trait StructuredLogCustomizer: Send + Sync {
    /// Name used in diagnostics. Defaults to the implementing type.
    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed(std::any::type_name::<Self>())
    }

    fn customize(
        &self,
        record: &mut LogRecord,
        invocation: &InvocationDescriptor<'_>,
        duration: Duration,
        outcome: Outcome,
    ) -> Result<(), CustomizerError>;
}

impl<F> StructuredLogCustomizer for F
where
    F: Fn(&mut LogRecord, &InvocationDescriptor<'_>, Duration, Outcome) -> Result<(), CustomizerError>
        + Send
        + Sync,
{
    fn customize(
        &self,
        record: &mut LogRecord,
        invocation: &InvocationDescriptor<'_>,
        duration: Duration,
        outcome: Outcome,
    ) -> Result<(), CustomizerError> {
        self(record, invocation, duration, outcome)
    }
}

/// Pin a closure to the customizer signature.
pub fn from_fn<F>(f: F) -> F
where
    F: Fn(&mut LogRecord, &InvocationDescriptor<'_>, Duration, Outcome) -> Result<(), CustomizerError>
        + Send
        + Sync,
{
    f
}

/// Customizer with an explicit name, for closures whose type name is not
/// meaningful in diagnostics.
pub struct Named<C> {
    name: Cow<'static, str>,
    inner: C,
}

impl<C: StructuredLogCustomizer> Named<C> {
    pub fn new(name: impl Into<Cow<'static, str>>, inner: C) -> Self {
        Named {
            name: name.into(),
            inner,
        }
    }
}

impl<C: StructuredLogCustomizer> StructuredLogCustomizer for Named<C> {
    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.name)
    }

    fn customize(
        &self,
        record: &mut LogRecord,
        invocation: &InvocationDescriptor<'_>,
        duration: Duration,
        outcome: Outcome,
    ) -> Result<(), CustomizerError> {
        self.inner.customize(record, invocation, duration, outcome)
    }
}
