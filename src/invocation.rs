use std::{any::Any, fmt, sync::Arc};

/// Opaque argument captured for customizers. Downcast to inspect it.
pub type Argument = Arc<dyn Any + Send + Sync>;

/// What is about to be intercepted: the declaring scope (usually a type
/// path), the operation name and, optionally, its arguments.
///
/// # Examples
/// ```rust
/// use method_slogger::Invocation;
///
/// struct InventoryService;
///
/// let invocation = Invocation::of::<InventoryService>("process").with_arg(42u32);
/// assert_eq!(invocation.operation(), "process");
/// assert_eq!(invocation.args().len(), 1);
/// ```
#[derive(Clone)]
pub struct Invocation {
    declaring_scope: String,
    operation: String,
    args: Vec<Argument>,
}

impl Invocation {
    pub fn new(declaring_scope: impl Into<String>, operation: impl Into<String>) -> Self {
        Invocation {
            declaring_scope: declaring_scope.into(),
            operation: operation.into(),
            args: Vec::new(),
        }
    }

    /// Use the full type path of `T` as the declaring scope.
    pub fn of<T: ?Sized>(operation: impl Into<String>) -> Self {
        Invocation::new(std::any::type_name::<T>(), operation)
    }

    pub fn with_arg<A: Any + Send + Sync>(mut self, arg: A) -> Self {
        self.args.push(Arc::new(arg));
        self
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = Argument>) -> Self {
        self.args.extend(args);
        self
    }

    pub fn declaring_scope(&self) -> &str {
        &self.declaring_scope
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn args(&self) -> &[Argument] {
        &self.args
    }

    /// Last path segment of the declaring scope, with generic parameters
    /// dropped. `None` when nothing is left.
    pub fn short_scope_name(&self) -> Option<&str> {
        short_name(&self.declaring_scope)
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("declaring_scope", &self.declaring_scope)
            .field("operation", &self.operation)
            .field("args", &self.args.len())
            .finish()
    }
}

fn short_name(path: &str) -> Option<&str> {
    let path = match path.find('<') {
        Some(idx) => &path[..idx],
        None => path,
    };
    let path = path.trim();
    let start = [path.rfind("::").map(|i| i + 2), path.rfind('.').map(|i| i + 1)]
        .into_iter()
        .flatten()
        .max()
        .unwrap_or(0);
    let name = &path[start..];
    (!name.is_empty()).then_some(name)
}

/// Whether the wrapped call returned normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn is_success(self) -> bool {
        self == Outcome::Success
    }
}

/// Captured failure of a wrapped call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureDetail {
    /// Display text of the failure, `None` if it renders empty.
    pub message: Option<String>,
    /// Type and full debug rendering of the failure.
    pub trace: String,
}

impl FailureDetail {
    pub fn from_error<E: fmt::Display + fmt::Debug + ?Sized>(type_name: &str, err: &E) -> Self {
        let message = err.to_string();
        let trace = if message.is_empty() {
            format!("{type_name}\n{err:?}")
        } else {
            format!("{type_name}: {message}\n{err:?}")
        };
        FailureDetail {
            message: (!message.is_empty()).then_some(message),
            trace,
        }
    }

    /// Failure raised by a panic; the payload is only read, never consumed.
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&'static str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned());
        let trace = match &message {
            Some(msg) => format!("panic: {msg}"),
            None => "panic: <non-string payload>".to_string(),
        };
        FailureDetail { message, trace }
    }
}

/// Read-only snapshot of one finished invocation, handed to customizers.
pub struct InvocationDescriptor<'a> {
    pub(crate) invocation: &'a Invocation,
    pub(crate) api_id: String,
    pub(crate) result: Option<&'a dyn Any>,
    pub(crate) failure: Option<&'a FailureDetail>,
}

impl<'a> InvocationDescriptor<'a> {
    /// Resolved api id used in the record.
    pub fn api_id(&self) -> &str {
        &self.api_id
    }

    pub fn declaring_scope(&self) -> &str {
        self.invocation.declaring_scope()
    }

    pub fn operation(&self) -> &str {
        self.invocation.operation()
    }

    pub fn args(&self) -> &[Argument] {
        self.invocation.args()
    }

    /// Value returned by the wrapped call; `None` on failure.
    pub fn result(&self) -> Option<&'a dyn Any> {
        self.result
    }

    pub fn failure(&self) -> Option<&'a FailureDetail> {
        self.failure
    }

    pub fn outcome(&self) -> Outcome {
        if self.failure.is_some() {
            Outcome::Failure
        } else {
            Outcome::Success
        }
    }
}

impl fmt::Debug for InvocationDescriptor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationDescriptor")
            .field("api_id", &self.api_id)
            .field("invocation", self.invocation)
            .field("outcome", &self.outcome())
            .field("failure", &self.failure)
            .finish()
    }
}
