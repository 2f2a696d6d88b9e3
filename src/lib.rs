//! File-backed session storage with flash data and CSRF tokens.
//!
//! A session is a binary-encoded key/value record persisted as
//! `<dir>/<40-char-id>.session`. Each request cycle activates the store with
//! [`SessionStore::start`], which picks the most recently modified unexpired
//! file (or initializes a fresh session), ages the flash generations, and
//! persists every subsequent mutation immediately.
//!
//! ```no_run
//! use session_vault::{SessionFileHandler, SessionStore, StoreConfig};
//!
//! # fn main() -> Result<(), session_vault::SessionError> {
//! let handler = SessionFileHandler::from_config(&StoreConfig::from_env());
//! let mut session = SessionStore::start(handler)?;
//! session.flash("status", "saved")?;
//! assert_eq!(session.token().len(), 40);
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod handler;
mod paths;
mod random;
mod schema;
mod store;
mod value;

pub use config::{StoreConfig, DEFAULT_TTL_MINUTES};
pub use error::SessionError;
pub use handler::{SessionFile, SessionFileHandler};
pub use paths::{session_file_name, sessions_root, SESSION_FILE_EXT};
pub use random::{ID_LEN, TOKEN_LEN};
pub use schema::{FlashState, SessionRecord};
pub use store::{SessionStore, OLD_INPUT_KEY};
pub use value::SessionValue;
