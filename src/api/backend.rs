//! Backend selection.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

/// Which store a cache operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-process volatile store
    Memory,
    /// Durable host store
    Local,
    /// Session-scoped host store
    Session,
}

impl Backend {
    pub const ALL: [Backend; 3] = [Backend::Memory, Backend::Local, Backend::Session];

    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Memory => "memory",
            Backend::Local => "local",
            Backend::Session => "session",
        }
    }

    pub fn is_persistent(&self) -> bool {
        !matches!(self, Backend::Memory)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unrecognized backend name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown cache backend: {0}")]
pub struct UnknownBackend(pub String);

impl FromStr for Backend {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Backend::Memory),
            "local" | "localstorage" => Ok(Backend::Local),
            "session" | "sessionstorage" => Ok(Backend::Session),
            _ => Err(UnknownBackend(s.to_string())),
        }
    }
}
