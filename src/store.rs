//! The session store.
//!
//! One `SessionStore` instance serves one request cycle: [`SessionStore::start`]
//! picks up (or creates) the current session, runs the flash tick, and every
//! mutation afterwards persists through the file handler immediately. Instances
//! are not meant to outlive their cycle or be shared across cycles.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::SessionError;
use crate::handler::SessionFileHandler;
use crate::random::{csrf_token, session_id};
use crate::schema::{FlashState, SessionRecord};
use crate::value::SessionValue;

/// Data key under which [`SessionStore::flash_input`] stores the previous
/// cycle's input mapping.
pub const OLD_INPUT_KEY: &str = "_old_input";

#[derive(Debug)]
pub struct SessionStore {
    handler: SessionFileHandler,
    id: String,
    record: SessionRecord,
}

impl SessionStore {
    /// Activates the session for this cycle.
    ///
    /// Loads the most recent unexpired session file if one exists, runs the
    /// flash tick, and persists. With no live file, or a file whose payload
    /// no longer decodes, a fresh session is initialized instead: new random
    /// id, empty data, new CSRF token.
    pub fn start(handler: SessionFileHandler) -> Result<Self, SessionError> {
        let Some(file) = handler.latest_session_file()? else {
            return Self::initialize(handler, SessionRecord::default());
        };

        let record = match handler.read(&file) {
            Ok(record) => record,
            Err(SessionError::CorruptSession { path, source }) => {
                warn!(
                    path = %path.display(),
                    error = %source,
                    "corrupt session payload; starting a fresh session"
                );
                return Self::initialize(handler, SessionRecord::default());
            }
            Err(err) => return Err(err),
        };

        let mut store = Self {
            handler,
            id: file.id,
            record,
        };
        store.tick_flash();
        store.persist()?;
        debug!(id = %store.id, rev = store.record.rev, "resumed session");
        Ok(store)
    }

    fn initialize(handler: SessionFileHandler, seed: SessionRecord) -> Result<Self, SessionError> {
        let mut record = seed;
        if record.token.is_empty() {
            record.token = csrf_token();
        }
        record.rev = 0;

        let mut store = Self {
            handler,
            id: session_id(),
            record,
        };
        store.persist()?;
        debug!(id = %store.id, "initialized session");
        Ok(store)
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The CSRF token. Always 40 characters once a session is initialized.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.record.token
    }

    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.record.data.contains_key(key)
    }

    /// Read-only view of the full user mapping.
    #[must_use]
    pub fn all(&self) -> &BTreeMap<String, SessionValue> {
        &self.record.data
    }

    /// Typed present/absent lookup.
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<&SessionValue> {
        self.record.data.get(key)
    }

    /// Like [`Self::lookup`], but a missing key is an error. Callers that can
    /// tolerate absence should use `lookup` or [`Self::get_or`].
    pub fn get(&self, key: &str) -> Result<&SessionValue, SessionError> {
        self.lookup(key)
            .ok_or_else(|| SessionError::key_not_found(key))
    }

    #[must_use]
    pub fn get_or(&self, key: &str, default: impl Into<SessionValue>) -> SessionValue {
        self.lookup(key)
            .cloned()
            .unwrap_or_else(|| default.into())
    }

    /// Sets `key` and persists immediately.
    pub fn put(
        &mut self,
        key: impl Into<String>,
        value: impl Into<SessionValue>,
    ) -> Result<(), SessionError> {
        self.record.data.insert(key.into(), value.into());
        self.persist()
    }

    /// Removes `key` if present. Persists unconditionally, absent key or not.
    pub fn remove(&mut self, key: &str) -> Result<(), SessionError> {
        self.record.data.remove(key);
        self.persist()
    }

    /// Discards the user mapping and flash bookkeeping, in memory only. The
    /// token is untouched. A later mutating call persists the cleared state.
    pub fn flush(&mut self) {
        self.record.data.clear();
        self.record.flash = FlashState::default();
    }

    /// Flashes a value: visible for the rest of this cycle and the next one,
    /// purged at the start of the cycle after that.
    pub fn flash(
        &mut self,
        key: impl Into<String>,
        value: impl Into<SessionValue>,
    ) -> Result<(), SessionError> {
        let key = key.into();
        self.record.flash.mark_fresh(&key);
        self.record.data.insert(key, value.into());
        self.persist()
    }

    /// Like [`Self::flash`], but front-loads the key into the expiring
    /// generation: the value survives only until the next cycle's tick.
    pub fn now(
        &mut self,
        key: impl Into<String>,
        value: impl Into<SessionValue>,
    ) -> Result<(), SessionError> {
        let key = key.into();
        self.record.flash.mark_stale(&key);
        self.record.data.insert(key, value.into());
        self.persist()
    }

    /// Flashes a request-input mapping under [`OLD_INPUT_KEY`].
    pub fn flash_input(
        &mut self,
        input: BTreeMap<String, SessionValue>,
    ) -> Result<(), SessionError> {
        self.flash(OLD_INPUT_KEY, SessionValue::Map(input))
    }

    /// Reads the value at `key` inside the flashed input mapping, if any.
    #[must_use]
    pub fn old_input(&self, key: &str) -> Option<&SessionValue> {
        match self.record.data.get(OLD_INPUT_KEY) {
            Some(SessionValue::Map(input)) => input.get(key),
            _ => None,
        }
    }

    #[must_use]
    pub fn old_input_or(&self, key: &str, default: impl Into<SessionValue>) -> SessionValue {
        self.old_input(key)
            .cloned()
            .unwrap_or_else(|| default.into())
    }

    /// Re-initializes with the current record as seed: new id, same contents,
    /// token preserved. The superseded file is left on disk and simply stops
    /// being the most recent one.
    pub fn regenerate(&mut self) -> Result<(), SessionError> {
        let seed = self.record.clone();
        *self = Self::initialize(self.handler.clone(), seed)?;
        Ok(())
    }

    /// Ages the flash generations: purges every key that was stale at the
    /// start of this cycle, then promotes fresh to stale.
    fn tick_flash(&mut self) {
        for key in self.record.flash.promote() {
            self.record.data.remove(&key);
        }
    }

    /// Bumps the revision and writes through the handler. Fails with
    /// [`SessionError::StaleWrite`] when the on-disk revision no longer
    /// matches the one this store last observed, i.e. a concurrent cycle for
    /// the same id persisted in between.
    fn persist(&mut self) -> Result<(), SessionError> {
        if let Some(found) = self.handler.peek_rev(&self.id)? {
            if found != self.record.rev {
                return Err(SessionError::StaleWrite {
                    id: self.id.clone(),
                    expected: self.record.rev,
                    found,
                });
            }
        }

        self.record.rev += 1;
        match self.handler.write(&self.id, &self.record) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.record.rev -= 1;
                Err(err)
            }
        }
    }
}
