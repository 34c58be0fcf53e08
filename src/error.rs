use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by level lookup, destination validation and sink delivery.
///
/// `InvalidLevel`, `InvalidDestination` and `InvalidTimestampFormat` are
/// configuration errors and are returned to the caller. `Delivery` never escapes a logging call, it is only
/// reported on the diagnostic stream.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("invalid log level {0:?}")]
    InvalidLevel(String),

    #[error("invalid log destination {path:?}: {reason}")]
    InvalidDestination { path: PathBuf, reason: String },

    #[error("invalid timestamp format {0:?}")]
    InvalidTimestampFormat(String),

    #[error("failed delivering record to {sink}: {reason}")]
    Delivery { sink: &'static str, reason: String },
}

impl LogError {
    pub(crate) fn delivery(sink: &'static str, reason: impl ToString) -> Self {
        LogError::Delivery {
            sink,
            reason: reason.to_string(),
        }
    }
}
