use std::{
    io::{self, Write},
    sync::{Mutex, PoisonError},
};

use crate::{record::LogRecord, severity::Severity};

/// Output stream a record is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    /// Successful invocations.
    Stdout,
    /// Failed invocations.
    Stderr,
}

/// One record ready to be written.
#[derive(Debug)]
pub struct Emission<'a> {
    pub stream: Stream,
    pub severity: Severity,
    pub record: &'a LogRecord,
    /// Rendered single-line form of `record`.
    pub line: &'a str,
}

/// Destination for rendered records.
///
/// Implementations must not fail the caller: write errors are theirs to
/// swallow or report.
pub trait RecordWriter: Send + Sync {
    fn write(&self, emission: &Emission<'_>);
}

/// Writes each line to the process stdout or stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdStreams;

impl RecordWriter for StdStreams {
    fn write(&self, emission: &Emission<'_>) {
        let result = match emission.stream {
            Stream::Stdout => writeln!(io::stdout().lock(), "{}", emission.line),
            Stream::Stderr => writeln!(io::stderr().lock(), "{}", emission.line),
        };
        if let Err(err) = result {
            log::debug!("failed to write structured record to {:?}: {}", emission.stream, err);
        }
    }
}

/// Keeps every written line in memory.
#[derive(Debug, Default)]
pub struct MemoryWriter {
    lines: Mutex<Vec<(Stream, String)>>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        MemoryWriter::default()
    }

    /// All lines written so far, in write order.
    pub fn lines(&self) -> Vec<(Stream, String)> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Lines written to `stream`.
    pub fn stream(&self, stream: Stream) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|(s, _)| *s == stream)
            .map(|(_, line)| line)
            .collect()
    }

    /// Drain and return everything written so far.
    pub fn take(&self) -> Vec<(Stream, String)> {
        std::mem::take(&mut *self.lines.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl RecordWriter for MemoryWriter {
    fn write(&self, emission: &Emission<'_>) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((emission.stream, emission.line.to_string()));
    }
}

impl<W: RecordWriter + ?Sized> RecordWriter for std::sync::Arc<W> {
    fn write(&self, emission: &Emission<'_>) {
        (**self).write(emission)
    }
}
