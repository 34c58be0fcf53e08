use std::path::PathBuf;

use eyre::{Context, OptionExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const LOG_LEVEL: &str = "LOG_LEVEL";
pub const LOG_FILE: &str = "LOG_FILE";

/// Section the logger reads from a config provider.
pub const DEFAULT_SECTION: &str = "log";

/// Raw, unvalidated logger settings as handed out by a config provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<String>,
}

fn default_level() -> String {
    "OFF".to_string()
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file: None,
        }
    }
}

impl LogSettings {
    /// Empty strings count as unset.
    pub fn normalized(self) -> Self {
        Self {
            level: if self.level.is_empty() {
                default_level()
            } else {
                self.level
            },
            file: self.file.filter(|file| !file.is_empty()),
        }
    }
}

pub trait ConfigProvider {
    fn get(&self, section: &str) -> eyre::Result<LogSettings>;
}

/// Reads `LOG_LEVEL` and `LOG_FILE`.
pub struct EnvConfigProvider {
    lookup: Box<dyn Fn(&str) -> Option<String> + Send + Sync>,
}

impl EnvConfigProvider {
    pub fn new() -> Self {
        Self::with_lookup(|key| std::env::var(key).ok())
    }

    /// Reads variables through `lookup` instead of the process environment.
    pub fn with_lookup(lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            lookup: Box::new(lookup),
        }
    }

    fn var(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|value| !value.is_empty())
    }
}

impl Default for EnvConfigProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigProvider for EnvConfigProvider {
    fn get(&self, _section: &str) -> eyre::Result<LogSettings> {
        Ok(LogSettings {
            level: self.var(LOG_LEVEL).unwrap_or_else(default_level),
            file: self.var(LOG_FILE),
        })
    }
}

/// Reads a section of a JSON document, e.g. `{"log": {"level": "info", "file": "app.log"}}`.
#[derive(Clone, Debug)]
pub struct JsonConfigProvider {
    path: PathBuf,
}

impl JsonConfigProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigProvider for JsonConfigProvider {
    fn get(&self, section: &str) -> eyre::Result<LogSettings> {
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed reading config file {}", self.path.display()))?;

        let mut document: Value = serde_json::from_str(&contents)
            .with_context(|| format!("Failed parsing config file {}", self.path.display()))?;

        let section_value = document
            .get_mut(section)
            .map(Value::take)
            .ok_or_eyre(format!(
                "Section {} missing from {}",
                section,
                self.path.display()
            ))?;

        serde_json::from_value(section_value)
            .with_context(|| format!("Invalid {} section in {}", section, self.path.display()))
    }
}

/// Settings from `provider`, or from the environment when the provider fails.
pub fn resolve(provider: &dyn ConfigProvider) -> LogSettings {
    resolve_with_fallback(provider, &EnvConfigProvider::new())
}

pub fn resolve_with_fallback(
    provider: &dyn ConfigProvider,
    fallback: &dyn ConfigProvider,
) -> LogSettings {
    let settings = match provider.get(DEFAULT_SECTION) {
        Ok(settings) => settings,
        Err(err) => {
            tracing::debug!(target: "lumber", "config provider failed, using environment: {:#}", err);
            fallback.get(DEFAULT_SECTION).unwrap_or_default()
        }
    };

    settings.normalized()
}
