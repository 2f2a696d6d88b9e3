//! Random identity material: session ids and CSRF tokens.

use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

/// Length of a session id, which doubles as the on-disk file stem.
pub const ID_LEN: usize = 40;

/// Length of a CSRF token.
pub const TOKEN_LEN: usize = 40;

#[must_use]
pub fn session_id() -> String {
    alphanumeric(ID_LEN)
}

#[must_use]
pub fn csrf_token() -> String {
    alphanumeric(TOKEN_LEN)
}

fn alphanumeric(len: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
