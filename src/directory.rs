//!
//! profilium user directory
//! ------------------------
//! Fixed in-memory account registry seeded at startup. Passwords are stored
//! and compared in plain text, and the admin listing serializes full records
//! including those passwords; both are part of the service's contract.

use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::{json, Value};

/// One directory entry. The wire form is camelCase and keyed by username, so
/// the username itself is not serialized into the record body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(skip_serializing)]
    pub username: String,
    pub password: String,
    pub is_admin: bool,
    pub email: String,
    pub full_name: String,
    pub department: String,
    pub role: String,
}

#[derive(Debug, Clone)]
pub struct Directory {
    users: Vec<UserRecord>,
}

impl Directory {
    /// The fixed account set every deployment starts with.
    pub fn seeded() -> Self {
        let users = vec![
            UserRecord {
                username: "user1".into(),
                password: "password123".into(),
                is_admin: false,
                email: "alice.johnson@company.com".into(),
                full_name: "Alice Johnson".into(),
                department: "Sales".into(),
                role: "user".into(),
            },
            UserRecord {
                username: "user2".into(),
                password: "password456".into(),
                is_admin: false,
                email: "bob.smith@company.com".into(),
                full_name: "Bob Smith".into(),
                department: "Marketing".into(),
                role: "user".into(),
            },
            UserRecord {
                username: "admin".into(),
                password: "4dminTheB3st!".into(),
                is_admin: true,
                email: "admin@company.com".into(),
                full_name: "Admin User".into(),
                department: "IT".into(),
                role: "admin".into(),
            },
            UserRecord {
                username: "manager".into(),
                password: "ohMyGodYouGotMe".into(),
                is_admin: false,
                email: "manager@company.com".into(),
                full_name: "Manager User".into(),
                department: "HR".into(),
                role: "manager".into(),
            },
        ];
        Self { users }
    }

    pub fn lookup(&self, username: &str) -> Option<&UserRecord> {
        self.users.iter().find(|u| u.username == username)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UserRecord> {
        self.users.iter()
    }

    /// Username-keyed wire map with full records, in seed order.
    pub fn wire_map(&self) -> Value {
        let mut out = serde_json::Map::new();
        for user in &self.users {
            out.insert(user.username.clone(), json!(user));
        }
        Value::Object(out)
    }
}

/// Process-wide directory instance.
pub fn global() -> &'static Directory {
    static DIRECTORY: Lazy<Directory> = Lazy::new(Directory::seeded);
    &DIRECTORY
}
