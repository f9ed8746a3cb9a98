//! # Job Output Sinks
//!
//! Append-only writers standing in for the job console. Writes are synchronous and
//! each call is applied atomically, so one log chunk is never split by another
//! container's output.

use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;

/// Append-only job output; no seek, no rewrite
pub trait JobOutputSink: Send + Sync {
    /// Append raw bytes
    fn write(&self, bytes: &[u8]) -> io::Result<()>;

    /// Append `line` followed by a newline
    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
        self.write(&bytes)
    }
}

/// Forwards to any `io::Write`, flushing after every write so output is live
pub struct WriterSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl WriterSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> JobOutputSink for WriterSink<W> {
    fn write(&self, bytes: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock();
        writer.write_all(bytes)?;
        writer.flush()
    }
}

/// Keeps everything written in memory
#[derive(Debug, Default)]
pub struct CapturingSink {
    buffer: Mutex<Vec<u8>>,
}

impl CapturingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Captured output, lossily decoded as UTF-8
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).into_owned()
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }
}

impl JobOutputSink for CapturingSink {
    fn write(&self, bytes: &[u8]) -> io::Result<()> {
        self.buffer.lock().extend_from_slice(bytes);
        Ok(())
    }
}

/// Writes through to the job sink and keeps a copy for the run report
pub(crate) struct TeeSink {
    primary: Arc<dyn JobOutputSink>,
    capture: CapturingSink,
}

impl TeeSink {
    pub(crate) fn new(primary: Arc<dyn JobOutputSink>) -> Self {
        Self {
            primary,
            capture: CapturingSink::new(),
        }
    }

    pub(crate) fn captured(&self) -> String {
        self.capture.contents()
    }
}

impl JobOutputSink for TeeSink {
    fn write(&self, bytes: &[u8]) -> io::Result<()> {
        // Captured even when the console write fails
        self.capture.write(bytes)?;
        self.primary.write(bytes)
    }
}
