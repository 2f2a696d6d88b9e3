//! The persisted session record.
//!
//! One session file holds exactly one `SessionRecord`, encoded with postcard.
//! The record keeps user data, flash bookkeeping, and the CSRF token as
//! separate fields serialized together, so control state never shares a
//! namespace with user keys.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::SessionValue;

/// The two flash generations, as key lists. Values always live in the user
/// data mapping; these lists only track which keys are due to expire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashState {
    /// Keys flashed during the current cycle. Visible through the next cycle.
    pub fresh: Vec<String>,
    /// Keys flashed during the previous cycle, pending expiry at the next tick.
    pub stale: Vec<String>,
}

impl FlashState {
    pub(crate) fn mark_fresh(&mut self, key: &str) {
        if !self.fresh.iter().any(|existing| existing == key) {
            self.fresh.push(key.to_owned());
        }
    }

    pub(crate) fn mark_stale(&mut self, key: &str) {
        if !self.stale.iter().any(|existing| existing == key) {
            self.stale.push(key.to_owned());
        }
    }

    /// Ages the generations by one cycle: returns the keys whose values are
    /// now due for removal, and moves the fresh list into their place.
    ///
    /// A stale key that was re-flashed meanwhile is exempt from removal; its
    /// lifetime is governed by the fresh entry it moved into.
    pub(crate) fn promote(&mut self) -> Vec<String> {
        let fresh = std::mem::take(&mut self.fresh);
        let mut expired = std::mem::take(&mut self.stale);
        expired.retain(|key| !fresh.contains(key));
        self.stale = fresh;
        expired
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Monotonic revision, bumped on every persist. Used to detect and reject
    /// stale writes from a concurrent cycle on the same session id.
    pub rev: u64,
    /// CSRF token. Non-empty from the moment a session is initialized.
    pub token: String,
    /// The user-visible mapping. Flashed values live here too.
    pub data: BTreeMap<String, SessionValue>,
    pub flash: FlashState,
}

impl SessionRecord {
    #[must_use]
    pub fn with_data(data: BTreeMap<String, SessionValue>) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    pub(crate) fn encode(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_stdvec(self)
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}
