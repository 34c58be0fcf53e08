use std::{
    fs::{self, OpenOptions},
    io,
    path::{Path, PathBuf},
};

use crate::error::LogError;

use super::level::Level;

/// Literal destination value that selects the standard output stream.
pub const STDOUT_SENTINEL: &str = "stdout";

/// Where formatted records go, derived from the raw configured destination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Destination {
    File(PathBuf),
    Webhook(String),
    Stdout,
    Fallback,
}

impl Destination {
    /// Classifies a raw destination value.
    ///
    /// Empty or missing values select the fallback diagnostic stream, anything
    /// starting with `http` (in any case) is a webhook URL and the
    /// [`STDOUT_SENTINEL`] selects standard output. Everything else is a path.
    pub fn classify(raw: Option<&str>) -> Self {
        match raw {
            None | Some("") => Destination::Fallback,
            Some(url) if is_url(url) => Destination::Webhook(url.to_string()),
            Some(STDOUT_SENTINEL) => Destination::Stdout,
            Some(path) => Destination::File(PathBuf::from(path)),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Destination::File(_) => "file",
            Destination::Webhook(_) => "webhook",
            Destination::Stdout => "stdout",
            Destination::Fallback => "stderr",
        }
    }
}

fn is_url(raw: &str) -> bool {
    raw.get(..4)
        .map_or(false, |scheme| scheme.eq_ignore_ascii_case("http"))
}

pub fn validate_level(name: &str) -> Result<Level, LogError> {
    name.parse()
}

/// Best-effort check that a file destination can be written to.
///
/// Webhooks, the stdout sentinel and empty destinations always pass. For
/// paths the parent directory has to exist, be a directory and accept a new
/// file, which is checked by creating and removing a scratch file in it.
/// Writes can still fail later, those failures are handled by the file sink.
pub fn validate_destination(raw: Option<&str>) -> Result<(), LogError> {
    match Destination::classify(raw) {
        Destination::File(path) => validate_parent(&path),
        _ => Ok(()),
    }
}

fn validate_parent(path: &Path) -> Result<(), LogError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let invalid = |reason: String| LogError::InvalidDestination {
        path: path.to_path_buf(),
        reason,
    };

    let metadata = fs::metadata(parent).map_err(|e| {
        invalid(format!(
            "parent directory {} is not accessible: {}",
            parent.display(),
            e
        ))
    })?;

    if !metadata.is_dir() {
        return Err(invalid(format!("{} is not a directory", parent.display())));
    }

    try_create_in(parent).map_err(|e| {
        invalid(format!(
            "parent directory {} is not writable: {}",
            parent.display(),
            e
        ))
    })
}

/// Creates and removes a uniquely named file in `dir`.
///
/// Mode bits miss ownership, ACLs and read-only mounts. Creating a file is
/// what the file sink does later.
fn try_create_in(dir: &Path) -> io::Result<()> {
    let scratch = dir.join(format!(".lumber-{}", uuid::Uuid::new_v4().as_simple()));
    OpenOptions::new().write(true).create_new(true).open(&scratch)?;
    fs::remove_file(&scratch)
}
