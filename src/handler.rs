//! Session file discovery and persistence.
//!
//! The handler owns everything that touches the sessions directory: listing
//! candidate files, deciding which one is current, reading and replacing the
//! binary payload, and sweeping expired files. It knows nothing about flash
//! promotion or tokens; that is the store's business.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::config::{StoreConfig, DEFAULT_TTL_MINUTES};
use crate::error::SessionError;
use crate::paths::{session_file_name, session_id_from_file_name};
use crate::schema::SessionRecord;

/// A candidate session file found in the sessions directory. Ephemeral; the
/// store keeps the id and drops the rest after activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFile {
    pub id: String,
    pub path: PathBuf,
    pub modified: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct SessionFileHandler {
    dir: PathBuf,
    ttl: Duration,
}

impl SessionFileHandler {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ttl: Duration::minutes(DEFAULT_TTL_MINUTES),
        }
    }

    #[must_use]
    pub fn from_config(config: &StoreConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            ttl: config.ttl,
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    #[must_use]
    pub fn session_path(&self, id: &str) -> PathBuf {
        self.dir.join(session_file_name(id))
    }

    /// Returns the most recently modified unexpired session file, or `None`
    /// when the directory is missing, empty, or holds only expired files.
    ///
    /// Candidates are sorted by `(modified, id)` before the newest is taken,
    /// so selection stays deterministic regardless of directory enumeration
    /// order. Expired files are left on disk; see [`Self::sweep_expired`].
    pub fn latest_session_file(&self) -> Result<Option<SessionFile>, SessionError> {
        let now = OffsetDateTime::now_utc();
        let mut files = self.session_files()?;
        files.retain(|file| is_live(file.modified, now, self.ttl));
        files.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.id.cmp(&b.id)));
        Ok(files.pop())
    }

    pub fn read(&self, file: &SessionFile) -> Result<SessionRecord, SessionError> {
        let bytes = fs::read(&file.path)
            .map_err(|source| SessionError::io("reading session file", &file.path, source))?;
        SessionRecord::decode(&bytes).map_err(|source| SessionError::corrupt(&file.path, source))
    }

    /// Atomically replaces `<dir>/<id>.session` with the encoded record,
    /// creating the directory on first use.
    pub fn write(&self, id: &str, record: &SessionRecord) -> Result<(), SessionError> {
        let path = self.session_path(id);
        let bytes = record
            .encode()
            .map_err(|source| SessionError::encode(&path, source))?;
        write_atomic(&self.dir, &path, &bytes)
    }

    /// Removes the file for `id`. An already-absent file is not an error.
    pub fn delete(&self, id: &str) -> Result<(), SessionError> {
        let path = self.session_path(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SessionError::io("deleting session file", &path, source)),
        }
    }

    /// Reads only the revision counter of the current on-disk record.
    ///
    /// A missing file reads as `None`; so does an undecodable one, which lets
    /// the next persist overwrite a corrupt blob instead of wedging the id.
    pub fn peek_rev(&self, id: &str) -> Result<Option<u64>, SessionError> {
        let path = self.session_path(id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(source) if source.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(SessionError::io("reading session file", &path, source));
            }
        };
        Ok(SessionRecord::decode(&bytes).map(|record| record.rev).ok())
    }

    /// Removes every session file at or past the TTL cutoff and returns how
    /// many were deleted. This is the explicit cleanup path; reads never
    /// evict.
    pub fn sweep_expired(&self) -> Result<usize, SessionError> {
        let now = OffsetDateTime::now_utc();
        let mut removed = 0usize;

        for file in self.session_files()? {
            if is_live(file.modified, now, self.ttl) {
                continue;
            }
            match fs::remove_file(&file.path) {
                Ok(()) => {
                    debug!(id = %file.id, "swept expired session file");
                    removed += 1;
                }
                Err(source) if source.kind() == io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(SessionError::io("sweeping session file", &file.path, source));
                }
            }
        }

        Ok(removed)
    }

    fn session_files(&self) -> Result<Vec<SessionFile>, SessionError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(source) if source.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(SessionError::io(
                    "listing sessions directory",
                    &self.dir,
                    source,
                ));
            }
        };

        let mut files = Vec::new();
        for entry in entries.filter_map(|entry| entry.ok()) {
            let path = entry.path();
            let Some(id) = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(session_id_from_file_name)
                .map(ToOwned::to_owned)
            else {
                continue;
            };

            let metadata = match entry.metadata() {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                // The entry may have been swept or replaced between listing
                // and stat; skip it rather than failing the whole listing.
                Err(_) => continue,
            };
            let modified = metadata
                .modified()
                .map_err(|source| SessionError::io("reading file mtime", &path, source))?;

            files.push(SessionFile {
                id,
                path,
                modified: OffsetDateTime::from(modified),
            });
        }

        Ok(files)
    }
}

/// A file counts as live while its mtime is strictly newer than `now - ttl`.
pub(crate) fn is_live(modified: OffsetDateTime, now: OffsetDateTime, ttl: Duration) -> bool {
    modified > now - ttl
}

fn write_atomic(dir: &Path, path: &Path, contents: &[u8]) -> Result<(), SessionError> {
    fs::create_dir_all(dir)
        .map_err(|source| SessionError::io("creating sessions directory", dir, source))?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "session".to_owned());
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
    let tmp_path = dir.join(format!(".{file_name}.tmp.{nanos}"));

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&tmp_path)
        .map_err(|source| SessionError::io("creating session temp file", &tmp_path, source))?;

    if let Err(source) = file.write_all(contents) {
        drop(file);
        let _ = fs::remove_file(&tmp_path);
        return Err(SessionError::io("writing session temp file", &tmp_path, source));
    }
    drop(file);

    if let Err(source) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(SessionError::io("replacing session file", path, source));
    }

    Ok(())
}
