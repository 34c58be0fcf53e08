use std::{
    io::{self, Write},
    sync::{Arc, Mutex},
};

use serde_json::Value;

use crate::{error::LogError, http::WebhookTransport};

use super::{Config, DefaultFormatter, Diagnostics, LogFormatter, LogRecord, LogSink};

/// Captures formatted records and diagnostic lines in memory.
#[derive(Clone, Default)]
pub(crate) struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl LogSink for MemorySink {
    fn write_log(&self, record: &LogRecord) -> Result<(), LogError> {
        let line = DefaultFormatter::new(Config::new()).format(record);
        self.lines.lock().unwrap().push(line);
        Ok(())
    }

    fn flush(&self) {}
}

impl Diagnostics for MemorySink {
    fn report(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }
}

/// Byte buffer standing in for stdout or stderr.
#[derive(Clone, Default)]
pub(crate) struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub(crate) fn contents(&self) -> String {
        String::from_utf8(self.bytes.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Webhook transport that records every post and answers with a fixed response.
pub(crate) struct RecordingTransport {
    response: String,
    posts: Mutex<Vec<(String, Value)>>,
}

impl RecordingTransport {
    pub(crate) fn succeeding() -> Self {
        Self::failing("")
    }

    pub(crate) fn failing(response: &str) -> Self {
        Self {
            response: response.to_string(),
            posts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn posts(&self) -> Vec<(String, Value)> {
        self.posts.lock().unwrap().clone()
    }
}

impl WebhookTransport for RecordingTransport {
    fn post(&self, url: &str, payload: &Value) -> String {
        self.posts
            .lock()
            .unwrap()
            .push((url.to_string(), payload.clone()));
        self.response.clone()
    }
}
