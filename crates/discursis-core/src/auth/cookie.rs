//! Persistence of the `DISCURSIS_AUTH` session cookie.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use parking_lot::Mutex;

/// Name of the cookie holding the persisted session
pub const COOKIE_NAME: &str = "DISCURSIS_AUTH";

/// Cookie file name in the cache directory
const COOKIE_FILE: &str = "cookies";

/// Expiry written on login; the session lasts until explicit logout.
const NEVER_EXPIRES: &str = "Fri, 31 Dec 9999 23:59:59 GMT";

/// Expiry written on logout, which deletes the cookie.
const ALREADY_EXPIRED: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Email and token recovered from (or written to) the session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedSession {
    pub email: String,
    pub token: String,
}

impl PersistedSession {
    pub fn new(email: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            token: token.into(),
        }
    }

    /// Cookie value in `<email>,<token>` form
    pub fn value(&self) -> String {
        format!("{},{}", self.email, self.token)
    }

    /// Full cookie line with a far-future expiry. Fails when the value would
    /// not parse back into the same email and token.
    pub fn to_cookie(&self) -> Result<String> {
        if self.email.is_empty() || self.token.is_empty() {
            bail!("Session cookie needs both an email and a token");
        }
        if self.email.contains(',') {
            bail!("Email must not contain ',' to be stored in the session cookie");
        }
        if !is_cookie_safe(&self.email) || !is_cookie_safe(&self.token) {
            bail!("Session cookie value must not contain ';', whitespace or control characters");
        }
        Ok(format!("{}={}; expires={}", COOKIE_NAME, self.value(), NEVER_EXPIRES))
    }

    /// Empty cookie line that is already expired
    pub fn expired_cookie() -> String {
        format!("{}=; expires={}", COOKIE_NAME, ALREADY_EXPIRED)
    }

    /// Parse a cookie line. Anything absent, expired, misnamed or malformed
    /// yields `None`.
    pub fn from_cookie(cookie: &str, now: DateTime<Utc>) -> Option<Self> {
        let mut parts = cookie.trim().split(';');
        let (name, value) = parts.next()?.trim().split_once('=')?;
        if name.trim() != COOKIE_NAME {
            return None;
        }

        for attr in parts {
            let Some((key, val)) = attr.trim().split_once('=') else {
                continue;
            };
            if key.trim().eq_ignore_ascii_case("expires") {
                let expires = parse_http_date(val.trim())?;
                if expires <= now {
                    return None;
                }
            }
        }

        Self::from_value(value.trim())
    }

    /// Parse a bare `<email>,<token>` value
    pub fn from_value(value: &str) -> Option<Self> {
        let (email, token) = value.split_once(',')?;
        if email.is_empty() || token.is_empty() {
            return None;
        }
        Some(Self::new(email, token))
    }
}

/// The line format has no quoting, so the value may not contain separators
/// or anything `from_cookie` would trim away.
fn is_cookie_safe(s: &str) -> bool {
    !s.chars().any(|c| c == ';' || c.is_whitespace() || c.is_control())
}

fn parse_http_date(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, HTTP_DATE_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Storage backend for the session cookie.
pub trait CookieJar: Send + Sync {
    /// Read the stored cookie line, if any
    fn load(&self) -> Result<Option<String>>;

    /// Replace the stored cookie line
    fn store(&self, cookie: &str) -> Result<()>;
}

/// Cookie jar backed by a file in the cache directory.
pub struct FileCookieJar {
    path: PathBuf,
}

impl FileCookieJar {
    pub fn new(cache_dir: impl AsRef<Path>) -> Self {
        Self {
            path: cache_dir.as_ref().join(COOKIE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CookieJar for FileCookieJar {
    fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents =
            std::fs::read_to_string(&self.path).context("Failed to read cookie file")?;
        let line = contents.trim();
        if line.is_empty() {
            Ok(None)
        } else {
            Ok(Some(line.to_string()))
        }
    }

    fn store(&self, cookie: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create cookie directory")?;
        }
        std::fs::write(&self.path, format!("{}\n", cookie))
            .context("Failed to write cookie file")?;
        Ok(())
    }
}

/// In-memory cookie jar. Clones share the same cookie, so a second store can
/// be built over what the first one persisted.
#[derive(Clone, Default)]
pub struct MemoryCookieJar {
    cookie: Arc<Mutex<Option<String>>>,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current raw cookie line
    pub fn cookie(&self) -> Option<String> {
        self.cookie.lock().clone()
    }
}

impl CookieJar for MemoryCookieJar {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.cookie.lock().clone())
    }

    fn store(&self, cookie: &str) -> Result<()> {
        *self.cookie.lock() = Some(cookie.to_string());
        Ok(())
    }
}
