//! Leveled logger that filters records against a configured threshold and
//! writes them to a file, a chat webhook, standard output or, when nothing is
//! configured, standard error.

pub mod config;
pub mod error;
pub mod http;
pub mod logging;

pub use error::LogError;
pub use logging::{Context, Level, Logger};

#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}
