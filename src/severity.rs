use std::{fmt, str::FromStr};

/// Severity of an emitted record, ordered from most to least verbose.
///
/// `Disabled` sits above everything else: a logger configured with it never
/// emits records for successful invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Severity {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Fatal,
    Disabled,
}

impl Severity {
    /// Lowercase name used for the `logLevel` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "trace",
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
            Severity::Disabled => "off",
        }
    }

    /// The `log` crate level this severity is checked against.
    ///
    /// `log` has no fatal tier, so `Fatal` shares the error tier.
    /// `Disabled` has no level at all.
    pub fn to_level(self) -> Option<log::Level> {
        match self {
            Severity::Trace => Some(log::Level::Trace),
            Severity::Debug => Some(log::Level::Debug),
            Severity::Info => Some(log::Level::Info),
            Severity::Warn => Some(log::Level::Warn),
            Severity::Error | Severity::Fatal => Some(log::Level::Error),
            Severity::Disabled => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown severity `{0}`")]
pub struct ParseSeverityError(pub String);

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Severity::Trace),
            "debug" => Ok(Severity::Debug),
            "info" => Ok(Severity::Info),
            "warn" | "warning" => Ok(Severity::Warn),
            "error" => Ok(Severity::Error),
            "fatal" => Ok(Severity::Fatal),
            "off" | "disabled" => Ok(Severity::Disabled),
            _ => Err(ParseSeverityError(s.to_string())),
        }
    }
}

/// Runtime answer to "is this severity tier currently enabled?".
///
/// Queried on every emission and never cached, so verbosity changes made
/// while the process runs take effect on the next invocation.
pub trait SeverityProbe: Send + Sync {
    fn enabled(&self, severity: Severity) -> bool;
}

impl<F> SeverityProbe for F
where
    F: Fn(Severity) -> bool + Send + Sync,
{
    fn enabled(&self, severity: Severity) -> bool {
        self(severity)
    }
}

/// Probe backed by the `log` facade: a tier is enabled when
/// `log::log_enabled!` says so for the configured target.
#[derive(Debug, Clone)]
pub struct LogProbe {
    target: String,
}

impl LogProbe {
    pub fn new(target: impl Into<String>) -> Self {
        LogProbe {
            target: target.into(),
        }
    }
}

impl SeverityProbe for LogProbe {
    fn enabled(&self, severity: Severity) -> bool {
        match severity.to_level() {
            Some(level) => log::log_enabled!(target: self.target.as_str(), level),
            None => false,
        }
    }
}

/// Probe used when none is configured.
///
/// The error tier (`Error`, `Fatal`) is always enabled, so failures are
/// written even when no `log` backend is installed. Lower tiers follow
/// [`LogProbe`].
#[derive(Debug, Clone)]
pub struct DefaultProbe {
    levels: LogProbe,
}

impl DefaultProbe {
    pub fn new(target: impl Into<String>) -> Self {
        DefaultProbe {
            levels: LogProbe::new(target),
        }
    }
}

impl SeverityProbe for DefaultProbe {
    fn enabled(&self, severity: Severity) -> bool {
        match severity {
            Severity::Error | Severity::Fatal => true,
            Severity::Disabled => false,
            _ => self.levels.enabled(severity),
        }
    }
}

/// Probe with a fixed threshold: every tier at or above it is enabled.
#[derive(Debug, Clone, Copy)]
pub struct StaticProbe(pub Severity);

impl SeverityProbe for StaticProbe {
    fn enabled(&self, severity: Severity) -> bool {
        severity != Severity::Disabled && severity >= self.0
    }
}

/// Outcome of the severity gate for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateDecision {
    pub severity: Severity,
    pub emit: bool,
}

/// Maps the configured minimum severity and the invocation outcome to the
/// severity a record is written at, and whether it is written at all.
pub struct SeverityGate;

impl SeverityGate {
    pub fn decide(configured: Severity, failed: bool, probe: &dyn SeverityProbe) -> GateDecision {
        if failed {
            return GateDecision {
                severity: Severity::Error,
                emit: probe.enabled(Severity::Error),
            };
        }

        GateDecision {
            severity: configured,
            emit: configured != Severity::Disabled && probe.enabled(configured),
        }
    }
}
