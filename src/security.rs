//!
//! profilium authorization gate
//! ----------------------------
//! Login against the user directory, the two request guards
//! (authenticated / admin), and the post-update privilege re-derivation.
//!
//! The re-derivation is where the deep-merge hazard becomes an access
//! control defect: after every profile update the session's admin flag is
//! recomputed from the merged profile's resolved `isAdmin` (own entry or
//! shared ancestor) and from the raw payload's top-level ancestor
//! redirection. The flag is promoted when either check passes and is never
//! demoted.

use serde_json::Value;

use crate::directory;
use crate::error::AppError;
use crate::merge::{overlay_carries_ancestor_admin, profile_claims_admin};
use crate::session::{default_profile, Session, SessionStore};
use crate::tprintln;

/// Authenticate against the directory and install a fresh session with the
/// default profile. The admin flag is copied from the directory record.
pub fn create_session(store: &SessionStore, username: &str, password: &str) -> Result<Session, AppError> {
    let Some(record) = directory::global().lookup(username) else {
        return Err(AppError::invalid_credentials("Invalid username or password"));
    };
    if record.password != password {
        return Err(AppError::invalid_credentials("Invalid username or password"));
    }
    let session = store.create(username, record.is_admin, default_profile(username));
    tprintln!("security.login user={} admin={}", username, record.is_admin);
    Ok(session)
}

/// Guard for endpoints that need any logged-in principal.
pub fn require_authenticated(session: Option<&Session>) -> Result<&Session, AppError> {
    session.ok_or_else(|| AppError::unauthenticated("Not authenticated"))
}

/// Guard for admin-only endpoints.
pub fn require_admin(session: Option<&Session>) -> Result<&Session, AppError> {
    let session = require_authenticated(session)?;
    if !session.is_admin {
        return Err(AppError::access_denied("Admin access required"));
    }
    Ok(session)
}

/// Re-derive the session's admin flag after a successful merge. Returns
/// whether a promoting condition held.
pub fn apply_escalation(session: &mut Session, raw_overlay: &Value) -> bool {
    let via_profile = profile_claims_admin(&session.profile);
    let via_payload = overlay_carries_ancestor_admin(raw_overlay);
    if via_profile || via_payload {
        if !session.is_admin {
            tprintln!(
                "security.escalate user={} via_profile={} via_payload={}",
                session.username, via_profile, via_payload
            );
        }
        session.is_admin = true;
        return true;
    }
    false
}

/// Escalation check used when the merge itself fails: only the raw payload
/// is consulted, since no merged profile exists.
pub fn apply_payload_escalation(session: &mut Session, raw_overlay: &Value) -> bool {
    if overlay_carries_ancestor_admin(raw_overlay) {
        session.is_admin = true;
        return true;
    }
    false
}
