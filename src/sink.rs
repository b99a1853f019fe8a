use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

/// Destination for serialized log lines.
///
/// The logger calls `send` synchronously, once per record, from the thread
/// that issued the log call; the line has reached the sink by the time the
/// log call returns.
pub trait LogSink: Send + Sync {
    /// Write one serialized record.
    ///
    /// **Parameters**
    /// - `line`: a complete single-line JSON document, without the trailing
    ///   newline.
    ///
    /// **Returns**
    /// - `Err(..)` if the underlying writer failed. The logger drops the
    ///   error; logging never fails the caller.
    fn send(&self, line: &str) -> io::Result<()>;

    /// Flush any buffered output. Default implementation is a no-op.
    fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}

/// Writes each line to standard error and flushes it.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleSink;

impl LogSink for ConsoleSink {
    fn send(&self, line: &str) -> io::Result<()> {
        let mut stderr = io::stderr().lock();
        stderr.write_all(line.as_bytes())?;
        stderr.write_all(b"\n")?;
        stderr.flush()
    }

    fn flush(&self) -> io::Result<()> {
        io::stderr().flush()
    }
}

/// Keeps every line in memory.
///
/// Clones share the same buffer, so a test can hand one clone to a logger
/// and inspect the other.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the lines written so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Most recent line, if any.
    pub fn last(&self) -> Option<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    pub fn clear(&self) {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl LogSink for MemorySink {
    fn send(&self, line: &str) -> io::Result<()> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
        Ok(())
    }
}
