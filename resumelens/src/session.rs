use crate::storage::*;
use crate::{Error, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    /// Lenient parse used for stored and server-provided values: anything that isn't "admin" is a
    /// regular user.
    pub fn from_stored(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("admin") {
            Role::Admin
        } else {
            Role::User
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(Error::Validation(format!("unknown role: {}", s))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub role: Role,
    pub display_name: Option<String>,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum LogoutReason {
    Explicit,
    /// Startup validation said the stored token is no good
    InvalidToken,
    RefreshFailed,
    /// Another process sharing the storage removed the session
    ExternalChange,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum SessionEvent {
    LoggedIn { role: Role, name: Option<String> },
    TokenRefreshed,
    ProfileUpdated { role: Role, name: Option<String> },
    StorageChanged,
    LoggedOut(LogoutReason),
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct SubscriptionId(usize);

type Listener = Box<dyn FnMut(&SessionEvent)>;

/// The single source of truth for "who is logged in".
///
/// Wraps a durable `KeyValueStore`; every state derivation reads through to storage so that two
/// stores sharing a file agree after a `resync()`. Listeners are notified synchronously, in
/// subscription order.
pub struct SessionStore {
    storage: Box<dyn KeyValueStore>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_id: usize,
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("authenticated", &self.is_authenticated())
            .field("role", &self.current_role())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl SessionStore {
    pub fn new(storage: Box<dyn KeyValueStore>) -> Self {
        SessionStore {
            storage,
            listeners: Vec::new(),
            next_id: 0,
        }
    }

    /// Non-durable store, eg for tests.
    pub fn ephemeral() -> Self {
        Self::new(Box::new(MemoryStore::new()))
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&SessionEvent) + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    fn emit(&mut self, event: SessionEvent) {
        debug!("session event: {:?}", event);
        for (_, listener) in self.listeners.iter_mut() {
            listener(&event);
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.storage
            .get(ACCESS_TOKEN_KEY)
            .filter(|t| !t.is_empty())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.storage
            .get(REFRESH_TOKEN_KEY)
            .filter(|t| !t.is_empty())
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }

    pub fn current_role(&self) -> Role {
        self.storage
            .get(ROLE_KEY)
            .map(|r| Role::from_stored(&r))
            .unwrap_or_default()
    }

    pub fn display_name(&self) -> Option<String> {
        self.storage.get(NAME_KEY).filter(|n| !n.is_empty())
    }

    pub fn session(&self) -> Option<Session> {
        Some(Session {
            access_token: self.access_token()?,
            refresh_token: self.refresh_token(),
            role: self.current_role(),
            display_name: self.display_name(),
        })
    }

    /// Persists a fresh session from a login or registration response.
    pub fn establish(&mut self, session: Session) -> Result<()> {
        if session.access_token.is_empty() {
            return Err(Error::Validation(
                "refusing to store an empty access token".to_string(),
            ));
        }
        self.storage.set(ACCESS_TOKEN_KEY, &session.access_token)?;
        match &session.refresh_token {
            Some(t) => self.storage.set(REFRESH_TOKEN_KEY, t)?,
            None => self.storage.remove(REFRESH_TOKEN_KEY)?,
        };
        self.storage.set(ROLE_KEY, session.role.as_str())?;
        match &session.display_name {
            Some(n) => self.storage.set(NAME_KEY, n)?,
            None => self.storage.remove(NAME_KEY)?,
        };
        info!("session established role={}", session.role);
        self.emit(SessionEvent::LoggedIn {
            role: session.role,
            name: session.display_name,
        });
        Ok(())
    }

    /// Stores a refreshed access token.
    ///
    /// Storage is resynced first. If the session is gone by then (logged out here or by another
    /// process) nothing is written and `Unauthorized` is returned.
    pub fn update_access_token(&mut self, token: &str) -> Result<()> {
        if token.is_empty() {
            return Err(Error::Validation(
                "refusing to store an empty access token".to_string(),
            ));
        }
        self.resync()?;
        if !self.is_authenticated() {
            return Err(Error::Unauthorized(
                "session ended before the token refresh completed".to_string(),
            ));
        }
        self.storage.set(ACCESS_TOKEN_KEY, token)?;
        self.emit(SessionEvent::TokenRefreshed);
        Ok(())
    }

    /// Re-derives role and display name, eg from a token validation response. Like
    /// `update_access_token`, refuses to write into a session that has ended.
    pub fn update_profile(&mut self, role: Role, name: Option<&str>) -> Result<()> {
        self.resync()?;
        if !self.is_authenticated() {
            return Err(Error::Unauthorized(
                "session ended before the profile update".to_string(),
            ));
        }
        self.storage.set(ROLE_KEY, role.as_str())?;
        if let Some(n) = name {
            self.storage.set(NAME_KEY, n)?;
        }
        self.emit(SessionEvent::ProfileUpdated {
            role,
            name: name.map(|n| n.to_string()),
        });
        Ok(())
    }

    /// Full teardown: clears every session key (and any legacy alias), then broadcasts
    /// `LoggedOut` once.
    ///
    /// The broadcast happens even if clearing storage failed part way; the first storage error is
    /// returned afterwards.
    pub fn logout(&mut self, reason: LogoutReason) -> Result<()> {
        let mut first_err: Option<Error> = None;
        for key in SESSION_KEYS.iter().chain(LEGACY_TOKEN_KEYS.iter()) {
            if let Err(e) = self.storage.remove(key) {
                warn!("failed to clear session key {key}: {e}");
                first_err.get_or_insert(e);
            }
        }
        info!("session cleared ({:?})", reason);
        self.emit(SessionEvent::LoggedOut(reason));
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Picks up changes made to shared storage by other processes.
    ///
    /// Returns true if anything changed. A session that disappeared underneath us is reported to
    /// listeners as `LoggedOut(ExternalChange)` after the `StorageChanged` event.
    pub fn resync(&mut self) -> Result<bool> {
        let was_authenticated = self.is_authenticated();
        if !self.storage.reload()? {
            return Ok(false);
        }
        migrate_legacy_keys(self.storage.as_mut())?;
        self.emit(SessionEvent::StorageChanged);
        if was_authenticated && !self.is_authenticated() {
            self.emit(SessionEvent::LoggedOut(LogoutReason::ExternalChange));
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn sample_session(role: Role) -> Session {
        Session {
            access_token: "access-1".to_string(),
            refresh_token: Some("refresh-1".to_string()),
            role,
            display_name: Some("Ada Lovelace".to_string()),
        }
    }

    fn recorder(store: &mut SessionStore) -> Rc<RefCell<Vec<SessionEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        store.subscribe(move |e| sink.borrow_mut().push(e.clone()));
        events
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!(Role::from_stored("admin"), Role::Admin);
        assert_eq!(Role::from_stored(" ADMIN "), Role::Admin);
        assert_eq!(Role::from_stored("superuser"), Role::User);
        assert_eq!(Role::from_stored(""), Role::User);
        assert_eq!(Role::from_str("admin").unwrap(), Role::Admin);
        assert!(Role::from_str("root").is_err());
        assert_eq!(Role::Admin.to_string(), "admin");
    }

    #[test]
    fn test_defaults_when_empty() {
        let store = SessionStore::ephemeral();
        assert!(!store.is_authenticated());
        assert_eq!(store.current_role(), Role::User);
        assert_eq!(store.session(), None);
    }

    #[test]
    fn test_empty_token_is_not_authenticated() {
        let mut mem = MemoryStore::new();
        mem.set(ACCESS_TOKEN_KEY, "").unwrap();
        let store = SessionStore::new(Box::new(mem));
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_establish_and_logout() {
        let mut store = SessionStore::ephemeral();
        let events = recorder(&mut store);

        store.establish(sample_session(Role::Admin)).unwrap();
        assert!(store.is_authenticated());
        assert_eq!(store.current_role(), Role::Admin);
        assert_eq!(store.display_name().as_deref(), Some("Ada Lovelace"));

        store.logout(LogoutReason::Explicit).unwrap();
        assert!(!store.is_authenticated());
        assert_eq!(store.current_role(), Role::User);
        assert_eq!(store.refresh_token(), None);
        assert_eq!(store.display_name(), None);

        let logouts = events
            .borrow()
            .iter()
            .filter(|e| matches!(e, SessionEvent::LoggedOut(_)))
            .count();
        assert_eq!(logouts, 1);
        assert_eq!(
            events.borrow().last(),
            Some(&SessionEvent::LoggedOut(LogoutReason::Explicit))
        );
    }

    #[test]
    fn test_logout_clears_legacy_aliases() {
        let mut mem = MemoryStore::new();
        mem.set(ACCESS_TOKEN_KEY, "a").unwrap();
        mem.set("authToken", "b").unwrap();
        let mut store = SessionStore::new(Box::new(mem));
        store.logout(LogoutReason::InvalidToken).unwrap();
        assert!(!store.is_authenticated());
        assert_eq!(store.storage.get("authToken"), None);
    }

    #[test]
    fn test_unsubscribe() {
        let mut store = SessionStore::ephemeral();
        store.establish(sample_session(Role::User)).unwrap();
        let count = Rc::new(RefCell::new(0));
        let c = count.clone();
        let id = store.subscribe(move |_| *c.borrow_mut() += 1);
        store.update_access_token("t1").unwrap();
        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.update_access_token("t2").unwrap();
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_refuses_empty_tokens() {
        let mut store = SessionStore::ephemeral();
        let mut s = sample_session(Role::User);
        s.access_token = String::new();
        assert!(store.establish(s).is_err());
        assert!(store.update_access_token("").is_err());
    }

    #[test]
    fn test_no_writes_after_logout() {
        let mut store = SessionStore::ephemeral();
        store.establish(sample_session(Role::Admin)).unwrap();
        store.logout(LogoutReason::Explicit).unwrap();
        let events = recorder(&mut store);

        assert!(matches!(
            store.update_access_token("late"),
            Err(Error::Unauthorized(_))
        ));
        assert!(matches!(
            store.update_profile(Role::Admin, Some("Ada")),
            Err(Error::Unauthorized(_))
        ));
        assert!(!store.is_authenticated());
        assert_eq!(store.current_role(), Role::User);
        assert!(events.borrow().is_empty());
    }
}
