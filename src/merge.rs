//!
//! profilium deep-merge engine
//! ---------------------------
//! Recursive merge of profile objects, plus the process-wide "shared
//! ancestor" table that every profile falls back to for fields it does not
//! carry itself.
//!
//! Key responsibilities:
//! - Combine a base map with one or more overlay objects, key by key in the
//!   overlay's own order: object-over-object recurses, everything else
//!   replaces wholesale.
//! - Redirect writes addressed to the reserved ancestor key into the shared
//!   table instead of the target map, at every level the merge walks.
//! - Expose the lookup chain (`resolve`) and the two admin-flag predicates
//!   the authorization layer re-derives privileges from after an update.
//!
//! The ancestor redirection is the deliberate hazard at the center of this
//! service: a crafted overlay mutates state observed by every profile in the
//! process. The engine reproduces that behavior rather than guarding
//! against it; see `security::apply_escalation` for the consumer side.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use thiserror::Error;

/// Reserved key addressing the shared ancestor table instead of the target.
pub const ANCESTOR_KEY: &str = "__proto__";

/// Field the authorization layer re-reads after every profile update.
pub const ADMIN_FLAG: &str = "isAdmin";

/// Insertion-ordered profile object. All merge inputs and outputs use this
/// shape; ordering is observable on the wire.
pub type ProfileMap = Map<String, Value>;

static SHARED_ANCESTOR: Lazy<RwLock<ProfileMap>> = Lazy::new(|| RwLock::new(ProfileMap::new()));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("update payload must be an object, got {0}")]
    OverlayNotObject(&'static str),
}

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Merge `overlays` onto `base`, left to right, and return the combined map.
///
/// Each overlay must be a JSON object; anything else fails the whole merge.
/// Missing keys never fail. Writes addressed to [`ANCESTOR_KEY`] at any
/// level the merge recurses through land on the shared ancestor table, not
/// on the result map.
pub fn merge(base: ProfileMap, overlays: &[&Value]) -> Result<ProfileMap, MergeError> {
    let mut acc = base;
    for overlay in overlays {
        let Value::Object(fields) = overlay else {
            return Err(MergeError::OverlayNotObject(json_type_name(overlay)));
        };
        // Ancestor writes collect in a local buffer during recursion and are
        // applied under one write lock per overlay; the lock is not
        // reentrant, so the recursion must never hold it.
        let mut staged = ProfileMap::new();
        merge_layer(&mut acc, fields, &mut staged);
        if !staged.is_empty() {
            let mut ancestor = SHARED_ANCESTOR.write();
            merge_plain(&mut ancestor, &staged);
        }
    }
    Ok(acc)
}

fn merge_layer(acc: &mut ProfileMap, overlay: &ProfileMap, staged: &mut ProfileMap) {
    for (key, incoming) in overlay {
        if key.as_str() == ANCESTOR_KEY {
            // Never becomes an own entry; non-object payloads are dropped
            // outright, mirroring an ancestor setter that ignores them.
            if let Value::Object(fields) = incoming {
                stage_ancestor(staged, fields);
            }
            continue;
        }
        let both_objects = matches!(incoming, Value::Object(_))
            && matches!(acc.get(key), Some(Value::Object(_)));
        if both_objects {
            if let (Some(Value::Object(existing)), Value::Object(fields)) = (acc.get_mut(key), incoming) {
                merge_layer(existing, fields, staged);
            }
        } else {
            // Scalars, arrays, and null replace wholesale, as does an object
            // landing on a non-object slot. Replacement values are copied
            // verbatim, literal reserved keys included; redirection only
            // happens where the merge itself writes a key.
            acc.insert(key.clone(), incoming.clone());
        }
    }
}

/// Collect an ancestor-addressed payload into the staging buffer. There is
/// only one ancestor level, so a nested redirection inside the payload
/// collapses into the same buffer.
fn stage_ancestor(staged: &mut ProfileMap, fields: &ProfileMap) {
    for (key, incoming) in fields {
        if key.as_str() == ANCESTOR_KEY {
            if let Value::Object(nested) = incoming {
                stage_ancestor(staged, nested);
            }
            continue;
        }
        let both_objects = matches!(incoming, Value::Object(_))
            && matches!(staged.get(key), Some(Value::Object(_)));
        if both_objects {
            if let (Some(Value::Object(existing)), Value::Object(nested)) = (staged.get_mut(key), incoming) {
                merge_plain(existing, nested);
            }
        } else {
            staged.insert(key.clone(), incoming.clone());
        }
    }
}

/// Plain recursive merge with no ancestor interception. Used to fold the
/// staging buffer into the shared table.
fn merge_plain(target: &mut ProfileMap, overlay: &ProfileMap) {
    for (key, incoming) in overlay {
        let both_objects = matches!(incoming, Value::Object(_))
            && matches!(target.get(key), Some(Value::Object(_)));
        if both_objects {
            if let (Some(Value::Object(existing)), Value::Object(fields)) = (target.get_mut(key), incoming) {
                merge_plain(existing, fields);
            }
        } else {
            target.insert(key.clone(), incoming.clone());
        }
    }
}

/// Resolve a field the way attribute lookup does: own entry first, then the
/// shared ancestor table.
pub fn resolve(profile: &ProfileMap, key: &str) -> Option<Value> {
    if let Some(v) = profile.get(key) {
        return Some(v.clone());
    }
    SHARED_ANCESTOR.read().get(key).cloned()
}

/// True when the profile resolves [`ADMIN_FLAG`] to exactly boolean `true`,
/// whether through an own entry or through the shared ancestor.
pub fn profile_claims_admin(profile: &ProfileMap) -> bool {
    matches!(resolve(profile, ADMIN_FLAG), Some(Value::Bool(true)))
}

/// True when a raw update payload carries a top-level ancestor redirection
/// whose fields set [`ADMIN_FLAG`] to exactly boolean `true`. Nested
/// redirections deeper in the payload do not count here; they are only
/// visible through the merged profile.
pub fn overlay_carries_ancestor_admin(overlay: &Value) -> bool {
    overlay
        .get(ANCESTOR_KEY)
        .and_then(|fields| fields.get(ADMIN_FLAG))
        .map(|flag| matches!(flag, Value::Bool(true)))
        .unwrap_or(false)
}

/// Current value of a field in the shared ancestor table, if any.
pub fn ancestor_value(key: &str) -> Option<Value> {
    SHARED_ANCESTOR.read().get(key).cloned()
}

/// True while no merge has redirected a write into the ancestor table.
pub fn ancestor_is_clean() -> bool {
    SHARED_ANCESTOR.read().is_empty()
}

/// Restore the ancestor table to its pristine empty state.
pub fn clear_shared_ancestor() {
    SHARED_ANCESTOR.write().clear();
}
