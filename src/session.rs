//!
//! profilium session store
//! -----------------------
//! In-memory registry of authenticated sessions. Each entry binds an opaque
//! id to a principal (`username`, `is_admin`) and its mutable profile map.
//! Entries are created at login, expire after a TTL with lazy pruning on
//! lookup, and are removed on logout.
//!
//! Lookups hand out a [`SessionHandle`]; update-profile performs its whole
//! read-merge-write under that handle's lock so racing updates to the same
//! session serialize instead of losing writes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};

use crate::merge::ProfileMap;
use crate::tprintln;

/// Default session lifetime.
const SESSION_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub username: String,
    pub is_admin: bool,
    pub profile: ProfileMap,
    pub issued_at: Instant,
    pub expires_at: Instant,
}

impl Session {
    /// Wire shape for the `user` field of authenticated responses. Serializes
    /// own profile entries only; ancestor fallback stays behavioral.
    pub fn public_view(&self) -> Value {
        json!({
            "username": self.username,
            "isAdmin": self.is_admin,
            "profile": Value::Object(self.profile.clone()),
        })
    }
}

/// Starting profile installed at login.
pub fn default_profile(username: &str) -> ProfileMap {
    let mut preferences = ProfileMap::new();
    preferences.insert("theme".into(), json!("light"));
    preferences.insert("notifications".into(), json!(true));
    let mut profile = ProfileMap::new();
    profile.insert("email".into(), json!(format!("{}@example.com", username)));
    profile.insert("fullName".into(), json!(format!("User {}", username)));
    profile.insert("preferences".into(), Value::Object(preferences));
    profile
}

fn gen_id() -> String {
    // 256-bit random id, base64url without padding
    let mut buf = [0u8; 32];
    let _ = getrandom::getrandom(&mut buf);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)
}

/// Live handle to one stored session.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Cloneable store handle shared by all request handlers.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, SessionHandle>>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self { Self::new() }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_ttl(SESSION_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self { inner: Arc::new(RwLock::new(HashMap::new())), ttl }
    }

    /// Install a fresh session and return a snapshot of it.
    pub fn create(&self, username: &str, is_admin: bool, profile: ProfileMap) -> Session {
        let now = Instant::now();
        let session = Session {
            id: gen_id(),
            username: username.to_string(),
            is_admin,
            profile,
            issued_at: now,
            expires_at: now + self.ttl,
        };
        let snapshot = session.clone();
        let id = session.id.clone();
        self.inner.write().insert(id, Arc::new(Mutex::new(session)));
        tprintln!("session.create user={} sid={} ttl_secs={}", snapshot.username, snapshot.id, self.ttl.as_secs());
        snapshot
    }

    /// Look up a live session. Expired entries are dropped and yield `None`.
    pub fn get(&self, id: &str) -> Option<SessionHandle> {
        let now = Instant::now();
        let mut drop_key: Option<String> = None;
        let out = {
            let map = self.inner.read();
            if let Some(handle) = map.get(id) {
                if handle.lock().expires_at > now {
                    Some(handle.clone())
                } else {
                    drop_key = Some(id.to_string());
                    None
                }
            } else {
                None
            }
        };
        if let Some(k) = drop_key {
            self.inner.write().remove(&k);
            tprintln!("session.expire sid={}", k);
        }
        out
    }

    pub fn remove(&self, id: &str) -> bool {
        let removed = self.inner.write().remove(id).is_some();
        if removed {
            tprintln!("session.remove sid={}", id);
        }
        removed
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_get_returns_live_handle() {
        let store = SessionStore::new();
        let snap = store.create("user1", false, default_profile("user1"));
        assert_eq!(store.len(), 1);

        let handle = store.get(&snap.id).expect("session should be live");
        let session = handle.lock();
        assert_eq!(session.username, "user1");
        assert!(!session.is_admin);
        assert_eq!(session.profile["email"], json!("user1@example.com"));
        assert!(session.expires_at > session.issued_at);
    }

    #[test]
    fn get_unknown_id_is_none() {
        let store = SessionStore::new();
        assert!(store.get("no-such-session").is_none());
    }

    #[test]
    fn zero_ttl_sessions_expire_immediately_and_are_pruned() {
        let store = SessionStore::with_ttl(Duration::ZERO);
        let snap = store.create("user2", false, default_profile("user2"));
        assert_eq!(store.len(), 1);
        assert!(store.get(&snap.id).is_none());
        assert!(store.is_empty(), "expired entry should be pruned on lookup");
    }

    #[test]
    fn remove_and_clear() {
        let store = SessionStore::new();
        let a = store.create("user1", false, default_profile("user1"));
        let _b = store.create("user2", false, default_profile("user2"));
        assert!(store.remove(&a.id));
        assert!(!store.remove(&a.id), "second removal is a no-op");
        assert_eq!(store.len(), 1);
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn handle_mutations_are_visible_to_later_lookups() {
        let store = SessionStore::new();
        let snap = store.create("user1", false, default_profile("user1"));
        {
            let handle = store.get(&snap.id).unwrap();
            let mut session = handle.lock();
            session.profile.insert("favoriteColor".into(), json!("teal"));
            session.is_admin = true;
        }
        let handle = store.get(&snap.id).unwrap();
        let session = handle.lock();
        assert_eq!(session.profile["favoriteColor"], json!("teal"));
        assert!(session.is_admin);
    }

    #[test]
    fn ids_are_unique_and_url_safe() {
        let store = SessionStore::new();
        let a = store.create("user1", false, ProfileMap::new());
        let b = store.create("user1", false, ProfileMap::new());
        assert_ne!(a.id, b.id);
        assert_eq!(store.len(), 2, "same user may hold several sessions");
        assert!(a.id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(a.id.len(), 43, "32 bytes base64url without padding");
    }

    #[test]
    fn default_profile_shape() {
        let profile = default_profile("user1");
        assert_eq!(
            Value::Object(profile),
            json!({
                "email": "user1@example.com",
                "fullName": "User user1",
                "preferences": {"theme": "light", "notifications": true},
            })
        );
    }

    #[test]
    fn public_view_shape() {
        let store = SessionStore::new();
        let snap = store.create("admin", true, default_profile("admin"));
        let view = snap.public_view();
        assert_eq!(view["username"], json!("admin"));
        assert_eq!(view["isAdmin"], json!(true));
        assert_eq!(view["profile"]["fullName"], json!("User admin"));
        assert!(view.get("id").is_none(), "session id never leaves the cookie channel");
    }
}
