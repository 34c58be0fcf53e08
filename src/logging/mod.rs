mod destination;
mod formatters;
mod hooks;
mod level;
mod logger;
mod sinks;

#[cfg(test)]
pub(crate) mod testing;

use chrono::{DateTime, Local};

use crate::error::LogError;

pub use destination::{validate_destination, validate_level, Destination, STDOUT_SENTINEL};
pub use formatters::{embed_payload, DefaultFormatter};
pub use hooks::{install, register_log_facade};
pub use level::{embed_color, rank, Level, NEUTRAL_COLOR};
pub use logger::{Builder, Config, Logger, Settings, DEFAULT_DATETIME_FORMAT};
pub use sinks::{FileSink, NullSink, StderrSink, StdoutSink, Stream, WebhookSink};

/// Key/value pairs attached to a record. Insertion order is preserved.
pub type Context = serde_json::Map<String, serde_json::Value>;

/// A single record, built for one logging call and dropped after dispatch.
#[derive(Debug, Clone)]
pub struct LogRecord<'a> {
    pub level: Level,
    pub message: &'a str,
    pub context: &'a Context,
    pub timestamp: DateTime<Local>,
}

impl<'a> LogRecord<'a> {
    pub fn new(level: Level, message: &'a str, context: &'a Context) -> Self {
        Self {
            level,
            message,
            context,
            timestamp: Local::now(),
        }
    }
}

pub trait LogFormatter: Sync + Send {
    fn format(&self, record: &LogRecord) -> String;
}

pub trait LogSink: Sync + Send {
    fn write_log(&self, record: &LogRecord) -> Result<(), LogError>;
    fn flush(&self);
}

/// Last-resort output for failures that must not reach the caller.
pub trait Diagnostics: Sync + Send {
    fn report(&self, line: &str);
}

/// Builds a [`Context`] from `key => value` pairs, keeping their order.
///
/// ```
/// let ctx = lumber::context! { "user" => 42, "path" => "/login" };
/// assert_eq!(ctx.keys().collect::<Vec<_>>(), ["user", "path"]);
/// ```
#[macro_export]
macro_rules! context {
    () => {
        $crate::logging::Context::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut ctx = $crate::logging::Context::new();
        $(
            ctx.insert(
                ::std::string::ToString::to_string(&$key),
                $crate::__private::serde_json::to_value(&$value)
                    .unwrap_or($crate::__private::serde_json::Value::Null),
            );
        )+
        ctx
    }};
}
