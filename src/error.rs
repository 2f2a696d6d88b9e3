use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt session payload at {path}: {source}")]
    CorruptSession {
        path: PathBuf,
        #[source]
        source: postcard::Error,
    },

    #[error("failed to encode session record for {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: postcard::Error,
    },

    #[error("key '{key}' not found in the session storage")]
    KeyNotFound { key: String },

    #[error("stale write for session '{id}': expected revision {expected}, found {found} on disk")]
    StaleWrite {
        id: String,
        expected: u64,
        found: u64,
    },
}

impl SessionError {
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn corrupt(path: impl Into<PathBuf>, source: postcard::Error) -> Self {
        Self::CorruptSession {
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn encode(path: impl Into<PathBuf>, source: postcard::Error) -> Self {
        Self::Encode {
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn key_not_found(key: impl Into<String>) -> Self {
        Self::KeyNotFound { key: key.into() }
    }
}
