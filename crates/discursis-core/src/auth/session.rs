//! Session state shared between the API client and the front end.

use anyhow::Result;
use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::models::Project;

use super::cookie::{CookieJar, PersistedSession};

/// Buffered session notifications per subscriber
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Session transitions broadcast to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// `set_auth_token` completed; views should refresh.
    LoggedIn { email: String },
    /// Explicit logout.
    LoggedOut,
    /// The server reported the token as expired. The host must send the
    /// user back through login.
    Invalidated,
}

#[derive(Debug, Default)]
struct SessionState {
    email: Option<String>,
    token: Option<String>,
    project: Option<Project>,
    /// Set once the cookie has been consulted, or the session was set or
    /// cleared in this process. The cookie is never read after that.
    cookie_checked: bool,
}

/// Current user identity, bearer token and "current project" cache.
///
/// The token is held in memory and mirrored into the `DISCURSIS_AUTH` cookie
/// so a later process can pick the session up again. The store is meant to be
/// shared behind an `Arc`.
pub struct SessionStore {
    state: RwLock<SessionState>,
    jar: Box<dyn CookieJar>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionStore {
    pub fn new(jar: impl CookieJar + 'static) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: RwLock::new(SessionState::default()),
            jar: Box::new(jar),
            events,
        }
    }

    /// Get the bearer token, restoring it from the cookie on first access.
    pub fn auth_token(&self) -> Option<String> {
        {
            let state = self.state.read();
            if state.token.is_some() || state.cookie_checked {
                return state.token.clone();
            }
        }

        let cookie = match self.jar.load() {
            Ok(Some(cookie)) => cookie,
            Ok(None) => {
                self.state.write().cookie_checked = true;
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read session cookie");
                self.state.write().cookie_checked = true;
                return None;
            }
        };
        let persisted = PersistedSession::from_cookie(&cookie, Utc::now());

        let mut state = self.state.write();
        // Another caller may have logged in or out while the cookie was read
        if state.token.is_some() || state.cookie_checked {
            return state.token.clone();
        }
        state.cookie_checked = true;
        let persisted = persisted?;
        debug!(email = %persisted.email, "Session restored from cookie");
        state.email = Some(persisted.email);
        state.token = Some(persisted.token.clone());
        Some(persisted.token)
    }

    /// Store a freshly issued token and persist it until logout.
    pub fn set_auth_token(&self, email: &str, token: &str) {
        {
            let mut state = self.state.write();
            state.email = Some(email.to_string());
            state.token = Some(token.to_string());
            state.cookie_checked = true;
        }

        let persisted = PersistedSession::new(email, token)
            .to_cookie()
            .and_then(|cookie| self.jar.store(&cookie));
        if let Err(e) = persisted {
            warn!(error = %e, "Failed to persist session cookie");
        }

        info!(email = email, "Logged in");
        let _ = self.events.send(SessionEvent::LoggedIn {
            email: email.to_string(),
        });
    }

    /// Log out: forget the token and expire the cookie.
    pub fn clear_auth_token(&self) {
        self.clear_session();
        info!("Logged out");
        let _ = self.events.send(SessionEvent::LoggedOut);
    }

    /// Clear the session after the server rejected the token as expired.
    pub fn invalidate(&self) {
        self.clear_session();
        warn!("Session invalidated by server, reauthentication required");
        let _ = self.events.send(SessionEvent::Invalidated);
    }

    fn clear_session(&self) {
        {
            let mut state = self.state.write();
            state.email = None;
            state.token = None;
            state.cookie_checked = true;
        }
        if let Err(e) = self.jar.store(&PersistedSession::expired_cookie()) {
            warn!(error = %e, "Failed to expire session cookie");
        }
    }

    /// In-memory email. Call `auth_token` first to pick up a persisted session.
    pub fn user(&self) -> Option<String> {
        self.state.read().email.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth_token().is_some()
    }

    /// The current project: the cached one if navigation set it, otherwise
    /// the server's default project. The fetched project is not cached.
    pub async fn project(&self, api: &ApiClient) -> Result<Project> {
        let cached = self.state.read().project.clone();
        match cached {
            Some(project) => Ok(project),
            None => api.default_project().await,
        }
    }

    pub fn set_project(&self, project: Project) {
        debug!(project_id = project.id, "Current project set");
        self.state.write().project = Some(project);
    }

    pub fn clear_project(&self) {
        self.state.write().project = None;
    }

    /// Subscribe to login/logout/invalidation notifications
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryCookieJar;

    #[test]
    fn test_set_then_get_token() {
        let store = SessionStore::new(MemoryCookieJar::new());
        assert_eq!(store.auth_token(), None);

        store.set_auth_token("a@b.com", "tok1");
        assert_eq!(store.auth_token().as_deref(), Some("tok1"));
        assert_eq!(store.user().as_deref(), Some("a@b.com"));
        assert!(store.is_authenticated());
    }

    #[test]
    fn test_clear_expires_cookie() {
        let jar = MemoryCookieJar::new();
        let store = SessionStore::new(jar.clone());
        store.set_auth_token("a@b.com", "tok1");
        store.clear_auth_token();

        assert_eq!(store.auth_token(), None);
        assert_eq!(store.user(), None);
        assert_eq!(jar.cookie(), Some(PersistedSession::expired_cookie()));

        // A fresh store over the same jar stays logged out
        let fresh = SessionStore::new(jar);
        assert_eq!(fresh.auth_token(), None);
    }

    #[test]
    fn test_fresh_store_restores_from_cookie() {
        let jar = MemoryCookieJar::new();
        SessionStore::new(jar.clone()).set_auth_token("a@b.com", "tok1");

        let fresh = SessionStore::new(jar);
        // Email is only known once the cookie has been read
        assert_eq!(fresh.user(), None);
        assert_eq!(fresh.auth_token().as_deref(), Some("tok1"));
        assert_eq!(fresh.user().as_deref(), Some("a@b.com"));
    }

    #[test]
    fn test_file_backed_restore() {
        let dir = tempfile::tempdir().unwrap();
        SessionStore::new(crate::auth::FileCookieJar::new(dir.path()))
            .set_auth_token("a@b.com", "tok1");

        let fresh = SessionStore::new(crate::auth::FileCookieJar::new(dir.path()));
        assert_eq!(fresh.auth_token().as_deref(), Some("tok1"));
        assert_eq!(fresh.user().as_deref(), Some("a@b.com"));
    }

    #[test]
    fn test_malformed_cookie_is_logged_out() {
        let jar = MemoryCookieJar::new();
        jar.store("DISCURSIS_AUTH=garbage").unwrap();
        let store = SessionStore::new(jar.clone());
        assert_eq!(store.auth_token(), None);
        // Nothing is rewritten when restore fails
        assert_eq!(jar.cookie().as_deref(), Some("DISCURSIS_AUTH=garbage"));
    }

    #[test]
    fn test_events() {
        let store = SessionStore::new(MemoryCookieJar::new());
        let mut rx = store.subscribe();

        store.set_auth_token("a@b.com", "tok1");
        store.clear_auth_token();
        store.set_auth_token("a@b.com", "tok2");
        store.invalidate();

        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::LoggedIn {
                email: "a@b.com".to_string()
            }
        );
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::LoggedOut);
        assert!(matches!(rx.try_recv().unwrap(), SessionEvent::LoggedIn { .. }));
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::Invalidated);
        assert_eq!(store.auth_token(), None);
    }

    /// Jar that accepts login cookies but fails to write the expired one
    #[derive(Clone, Default)]
    struct StuckJar(MemoryCookieJar);

    impl CookieJar for StuckJar {
        fn load(&self) -> Result<Option<String>> {
            self.0.load()
        }

        fn store(&self, cookie: &str) -> Result<()> {
            if cookie == PersistedSession::expired_cookie() {
                anyhow::bail!("read-only cookie storage");
            }
            self.0.store(cookie)
        }
    }

    #[test]
    fn test_logout_sticks_when_cookie_write_fails() {
        let store = SessionStore::new(StuckJar::default());
        store.set_auth_token("a@b.com", "tok1");
        store.clear_auth_token();

        assert_eq!(store.auth_token(), None);
        assert_eq!(store.user(), None);
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_invalidate_sticks_when_cookie_write_fails() {
        let jar = StuckJar::default();
        jar.store(&PersistedSession::new("a@b.com", "tok1").to_cookie().unwrap())
            .unwrap();

        let store = SessionStore::new(jar);
        assert_eq!(store.auth_token().as_deref(), Some("tok1"));
        store.invalidate();
        assert_eq!(store.auth_token(), None);
        assert_eq!(store.user(), None);
    }

    #[test]
    fn test_unstorable_session_is_memory_only() {
        let jar = MemoryCookieJar::new();
        let store = SessionStore::new(jar.clone());
        store.set_auth_token("a,b@c.com", "tok1; expires=Thu, 01 Jan 1970 00:00:00 GMT");

        assert_eq!(
            store.auth_token().as_deref(),
            Some("tok1; expires=Thu, 01 Jan 1970 00:00:00 GMT")
        );
        assert_eq!(store.user().as_deref(), Some("a,b@c.com"));
        // Nothing was written, so a later process starts logged out
        assert_eq!(jar.cookie(), None);
        assert_eq!(SessionStore::new(jar).auth_token(), None);
    }

    #[test]
    fn test_cookie_read_once() {
        let jar = MemoryCookieJar::new();
        let store = SessionStore::new(jar.clone());
        assert_eq!(store.auth_token(), None);

        // A cookie written by another process later is not picked up
        jar.store(&PersistedSession::new("a@b.com", "tok1").to_cookie().unwrap())
            .unwrap();
        assert_eq!(store.auth_token(), None);
    }

    #[test]
    fn test_project_cache() {
        let store = SessionStore::new(MemoryCookieJar::new());
        let project: Project = serde_json::from_str(
            r#"{"id": 3, "name": "Debates", "language": "english", "status": "Ready"}"#,
        )
        .unwrap();
        store.set_project(project.clone());
        assert_eq!(store.state.read().project.as_ref(), Some(&project));

        // Logging out does not touch the project cache
        store.clear_auth_token();
        assert_eq!(store.state.read().project.as_ref(), Some(&project));

        store.clear_project();
        assert!(store.state.read().project.is_none());
    }
}
