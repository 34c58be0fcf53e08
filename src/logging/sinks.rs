use std::{
    fs::OpenOptions,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use crate::{error::LogError, http::WebhookTransport};

use super::{formatters::embed_payload, Diagnostics, LogFormatter, LogRecord, LogSink};

/// Appends one line per record to a file.
///
/// The file is opened for every record and held under an exclusive lock
/// while the line is written, so concurrent writers never interleave
/// partial lines.
pub struct FileSink {
    file_path: PathBuf,
    formatter: Box<dyn LogFormatter>,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>, formatter: Box<dyn LogFormatter>) -> Self {
        Self {
            file_path: path.into(),
            formatter,
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    fn append(&self, line: &str) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;

        file.lock()?;
        let written = file
            .write_all(format!("{}\n", line).as_bytes())
            .and_then(|_| file.flush());
        let unlocked = file.unlock();

        written.and(unlocked)
    }
}

impl LogSink for FileSink {
    fn write_log(&self, record: &LogRecord) -> Result<(), LogError> {
        self.append(&self.formatter.format(record))
            .map_err(|e| LogError::delivery("file", format!("{}: {}", self.file_path.display(), e)))
    }

    fn flush(&self) {}
}

/// Byte stream behind a [`StdoutSink`] or [`StderrSink`].
///
/// `Writer` replaces the process stream, e.g. to capture output.
#[derive(Clone)]
pub enum Stream {
    Stdout,
    Stderr,
    Writer(Arc<Mutex<dyn Write + Send>>),
}

impl Stream {
    pub fn writer(writer: impl Write + Send + 'static) -> Self {
        Stream::Writer(Arc::new(Mutex::new(writer)))
    }

    /// Writes `line` and a newline under one lock, then flushes.
    pub fn write_line(&self, line: &str) -> io::Result<()> {
        match self {
            Stream::Stdout => terminated(&mut io::stdout().lock(), line),
            Stream::Stderr => terminated(&mut io::stderr().lock(), line),
            Stream::Writer(writer) => terminated(&mut *lock(writer)?, line),
        }
    }

    pub fn flush(&self) -> io::Result<()> {
        match self {
            Stream::Stdout => io::stdout().lock().flush(),
            Stream::Stderr => io::stderr().lock().flush(),
            Stream::Writer(writer) => lock(writer)?.flush(),
        }
    }
}

fn lock<'a>(
    writer: &'a Mutex<dyn Write + Send>,
) -> io::Result<std::sync::MutexGuard<'a, dyn Write + Send + 'static>> {
    writer
        .lock()
        .map_err(|_| io::Error::new(io::ErrorKind::Other, "stream writer poisoned"))
}

fn terminated(writer: &mut dyn Write, line: &str) -> io::Result<()> {
    writer.write_all(format!("{}\n", line).as_bytes())?;
    writer.flush()
}

pub struct StdoutSink {
    stream: Stream,
    formatter: Box<dyn LogFormatter>,
}

impl StdoutSink {
    pub fn new(formatter: Box<dyn LogFormatter>) -> Self {
        Self::with_stream(Stream::Stdout, formatter)
    }

    pub fn with_stream(stream: Stream, formatter: Box<dyn LogFormatter>) -> Self {
        Self { stream, formatter }
    }
}

impl LogSink for StdoutSink {
    fn write_log(&self, record: &LogRecord) -> Result<(), LogError> {
        self.stream
            .write_line(&self.formatter.format(record))
            .map_err(|e| LogError::delivery("stdout", e))
    }

    fn flush(&self) {
        let _ = self.stream.flush();
    }
}

/// Standard error, used both as the fallback destination and as the
/// diagnostic stream delivery failures are reported on.
pub struct StderrSink {
    stream: Stream,
    formatter: Box<dyn LogFormatter>,
}

impl StderrSink {
    pub fn new(formatter: Box<dyn LogFormatter>) -> Self {
        Self::with_stream(Stream::Stderr, formatter)
    }

    pub fn with_stream(stream: Stream, formatter: Box<dyn LogFormatter>) -> Self {
        Self { stream, formatter }
    }
}

impl LogSink for StderrSink {
    fn write_log(&self, record: &LogRecord) -> Result<(), LogError> {
        self.stream
            .write_line(&self.formatter.format(record))
            .map_err(|e| LogError::delivery("stderr", e))
    }

    fn flush(&self) {
        let _ = self.stream.flush();
    }
}

impl Diagnostics for StderrSink {
    fn report(&self, line: &str) {
        // Nowhere left to report to if stderr itself fails.
        let _ = self.stream.write_line(line);
    }
}

/// Posts every record as an embed to a webhook URL.
pub struct WebhookSink {
    url: String,
    transport: Arc<dyn WebhookTransport>,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>, transport: Arc<dyn WebhookTransport>) -> Self {
        Self {
            url: url.into(),
            transport,
        }
    }
}

impl LogSink for WebhookSink {
    fn write_log(&self, record: &LogRecord) -> Result<(), LogError> {
        let response = self.transport.post(&self.url, &embed_payload(record));

        if response.is_empty() {
            Ok(())
        } else {
            Err(LogError::delivery("webhook", response))
        }
    }

    fn flush(&self) {}
}

pub struct NullSink {}

impl NullSink {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for NullSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for NullSink {
    fn write_log(&self, _record: &LogRecord) -> Result<(), LogError> {
        Ok(())
    }

    fn flush(&self) {}
}
