use std::{fmt, str::FromStr};

use log::LevelFilter;

use crate::error::LogError;

/// Severity of a record, ordered from least to most severe.
///
/// `Off` is only meaningful as a threshold: its rank exceeds every message
/// level, so a logger configured with it never emits anything.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Notice,
    Warn,
    Error,
    Critical,
    Alert,
    Emergency,
    Fatal,
    Off,
}

/// Embed color used when a level name is not recognized.
pub const NEUTRAL_COLOR: u32 = 0x95A5A6;

impl Level {
    /// The levels a record can be written at, in ascending severity.
    pub const MESSAGE_LEVELS: [Level; 10] = [
        Level::Trace,
        Level::Debug,
        Level::Info,
        Level::Notice,
        Level::Warn,
        Level::Error,
        Level::Critical,
        Level::Alert,
        Level::Emergency,
        Level::Fatal,
    ];

    pub fn rank(self) -> u8 {
        match self {
            Level::Trace => 0,
            Level::Debug => 1,
            Level::Info => 2,
            Level::Notice => 3,
            Level::Warn => 4,
            Level::Error => 5,
            Level::Critical => 6,
            Level::Alert => 7,
            Level::Emergency => 8,
            Level::Fatal => 9,
            Level::Off => 10,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Notice => "NOTICE",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
            Level::Alert => "ALERT",
            Level::Emergency => "EMERGENCY",
            Level::Fatal => "FATAL",
            Level::Off => "OFF",
        }
    }

    /// 24-bit color of webhook embeds for this level.
    pub fn color(self) -> u32 {
        match self {
            Level::Trace => 0x7F8C8D,
            Level::Debug => 0x3498DB,
            Level::Info => 0x2ECC71,
            Level::Notice => 0x1ABC9C,
            Level::Warn => 0xF1C40F,
            Level::Error => 0xE67E22,
            Level::Critical => 0xE74C3C,
            Level::Alert => 0xC0392B,
            Level::Emergency => 0x8E44AD,
            Level::Fatal => 0x2C2F33,
            Level::Off => NEUTRAL_COLOR,
        }
    }

    /// The closest `log` facade filter, used when this logger backs the facade.
    ///
    /// The facade only knows five levels, so everything above `Error` is
    /// collapsed into it.
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            Level::Trace => LevelFilter::Trace,
            Level::Debug => LevelFilter::Debug,
            Level::Info | Level::Notice => LevelFilter::Info,
            Level::Warn => LevelFilter::Warn,
            Level::Error
            | Level::Critical
            | Level::Alert
            | Level::Emergency
            | Level::Fatal => LevelFilter::Error,
            Level::Off => LevelFilter::Off,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TRACE" => Ok(Level::Trace),
            "DEBUG" => Ok(Level::Debug),
            "INFO" => Ok(Level::Info),
            "NOTICE" => Ok(Level::Notice),
            "WARN" => Ok(Level::Warn),
            "ERROR" => Ok(Level::Error),
            "CRITICAL" => Ok(Level::Critical),
            "ALERT" => Ok(Level::Alert),
            "EMERGENCY" => Ok(Level::Emergency),
            "FATAL" => Ok(Level::Fatal),
            "OFF" => Ok(Level::Off),
            _ => Err(LogError::InvalidLevel(s.to_string())),
        }
    }
}

impl From<log::Level> for Level {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Level::Error,
            log::Level::Warn => Level::Warn,
            log::Level::Info => Level::Info,
            log::Level::Debug => Level::Debug,
            log::Level::Trace => Level::Trace,
        }
    }
}

/// Rank of a level given by name, case-insensitive.
pub fn rank(name: &str) -> Result<u8, LogError> {
    name.parse::<Level>().map(Level::rank)
}

/// Embed color for a level given by name; unknown names get [`NEUTRAL_COLOR`].
pub fn embed_color(name: &str) -> u32 {
    name.parse::<Level>()
        .map(Level::color)
        .unwrap_or(NEUTRAL_COLOR)
}
