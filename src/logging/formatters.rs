use std::fmt::Write as _;

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};

use super::{
    logger::{Config, DEFAULT_DATETIME_FORMAT},
    Level, LogFormatter, LogRecord,
};

pub struct DefaultFormatter {
    config: Config,
}

impl DefaultFormatter {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Renders the record time with the configured layout.
    ///
    /// Layouts chrono cannot render fall back to [`DEFAULT_DATETIME_FORMAT`],
    /// formatting a record never panics.
    fn timestamp(&self, record: &LogRecord) -> String {
        let mut out = String::new();
        match write!(out, "{}", record.timestamp.format(&self.config.datetime_format)) {
            Ok(()) => out,
            Err(_) => record
                .timestamp
                .format(DEFAULT_DATETIME_FORMAT)
                .to_string(),
        }
    }

    fn format_level(&self, level: Level) -> String {
        if !self.config.use_ansi {
            return format!("[{}]", level);
        }

        let color = match level {
            Level::Trace => "\x1b[0;37m",
            Level::Debug => "\x1b[0;34m",
            Level::Info | Level::Notice => "\x1b[0;32m",
            Level::Warn => "\x1b[0;33m",
            Level::Error | Level::Critical => "\x1b[0;31m",
            Level::Alert | Level::Emergency | Level::Fatal => "\x1b[1;31m",
            Level::Off => "",
        };
        format!("{}[{}]\x1b[0m", color, level)
    }
}

impl LogFormatter for DefaultFormatter {
    fn format(&self, record: &LogRecord) -> String {
        let context = serde_json::to_string(record.context).unwrap_or_else(|_| "{}".to_string());

        format!(
            "{} {} {} {}",
            self.timestamp(record),
            self.format_level(record.level),
            record.message,
            context,
        )
    }
}

/// Chat-style embed payload for webhook destinations.
///
/// The title carries a relative-time marker (`<t:UNIX:R>`) and the level,
/// every context entry becomes an inline field in insertion order.
pub fn embed_payload(record: &LogRecord) -> Value {
    let fields: Vec<Value> = record
        .context
        .iter()
        .map(|(name, value)| {
            json!({
                "name": name,
                "value": field_value(value),
                "inline": true,
            })
        })
        .collect();

    json!({
        "embeds": [{
            "title": format!("<t:{}:R> [{}]", record.timestamp.timestamp(), record.level),
            "description": record.message,
            "color": record.level.color(),
            "timestamp": record
                .timestamp
                .with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            "fields": fields,
        }]
    })
}

fn field_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
