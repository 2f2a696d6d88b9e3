use std::path::{Path, PathBuf};

pub const SESSIONS_DIR: [&str; 2] = ["storage", "sessions"];

pub const SESSION_FILE_EXT: &str = "session";

#[must_use]
pub fn sessions_root(base: &Path) -> PathBuf {
    base.join(SESSIONS_DIR[0]).join(SESSIONS_DIR[1])
}

#[must_use]
pub fn session_file_name(id: &str) -> String {
    format!("{id}.{SESSION_FILE_EXT}")
}

/// Inverse of [`session_file_name`]. Returns `None` for anything that is not
/// a non-empty stem followed by the session extension.
#[must_use]
pub fn session_id_from_file_name(name: &str) -> Option<&str> {
    let stem = name.strip_suffix(SESSION_FILE_EXT)?;
    let id = stem.strip_suffix('.')?;
    if id.is_empty() {
        return None;
    }
    Some(id)
}
