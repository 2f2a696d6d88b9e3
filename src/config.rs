//! Store configuration.
//!
//! Defaults match the classic layout (`storage/sessions`, 60-minute TTL);
//! both knobs can be overridden programmatically or from the environment.

use std::env;
use std::path::{Path, PathBuf};

use time::Duration;

use crate::paths;

pub const DEFAULT_TTL_MINUTES: i64 = 60;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory the session files live in.
    pub dir: PathBuf,
    /// Recency window for a file to count as the current session.
    pub ttl: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: paths::sessions_root(Path::new(".")),
            ttl: Duration::minutes(DEFAULT_TTL_MINUTES),
        }
    }
}

impl StoreConfig {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Reads `SESSION_VAULT_DIR` and `SESSION_VAULT_TTL_MINUTES`, keeping the
    /// defaults for anything unset, empty, or unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(dir) = env_string_opt("SESSION_VAULT_DIR") {
            config.dir = PathBuf::from(dir);
        }

        if let Some(minutes) = env_string_opt("SESSION_VAULT_TTL_MINUTES")
            .and_then(|value| value.parse::<i64>().ok())
            .filter(|minutes| *minutes > 0)
        {
            config.ttl = Duration::minutes(minutes);
        }

        config
    }
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}
