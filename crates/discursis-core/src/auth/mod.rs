//! Authentication module for managing the user session.
//!
//! This module provides:
//! - `SessionStore`: in-memory session with lazy restore and login notifications
//! - `CookieJar`: persistence of the `DISCURSIS_AUTH` cookie
//! - `is_session_expired`: advisory decoding of the token's `exp` claim
//!
//! Token validity is decided by the server; a persisted session lasts until
//! explicit logout or a server-signalled expiry.

pub mod cookie;
pub mod session;
pub mod token;

pub use cookie::{CookieJar, FileCookieJar, MemoryCookieJar, PersistedSession};
pub use session::{SessionEvent, SessionStore};
pub use token::{is_session_expired, token_expiry};
