//! Login-capable user account record.
//!
//! Users are created either directly (admin provisioning) or as a side effect
//! of membership approval. The record itself is a plain identity row; the
//! last-active-admin invariant is enforced at the engine boundary, where the
//! count of active admins is known.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use medlem_core::{normalize_email, DomainResult, UserId};

use crate::roles::Role;

/// Identity record for an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub display_name: Option<String>,
    /// Argon2 PHC string. Never serialized outward.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub is_board_member: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: UserId,
    pub email: String,
    pub display_name: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub is_board_member: bool,
}

impl NewUser {
    /// Validate and normalize the input, producing the persisted record.
    pub fn into_user(self, created_at: DateTime<Utc>) -> DomainResult<User> {
        let email = normalize_email(&self.email)?;

        let display_name = match self.display_name {
            Some(name) => {
                let name = name.trim();
                if name.is_empty() {
                    None
                } else {
                    Some(name.to_string())
                }
            }
            None => None,
        };

        Ok(User {
            id: self.id,
            email,
            display_name,
            password_hash: self.password_hash,
            role: self.role,
            is_board_member: self.is_board_member,
            is_active: true,
            created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            id: UserId::new(),
            email: email.to_string(),
            display_name: Some("  Sokha Lind  ".to_string()),
            password_hash: "$argon2id$stub".to_string(),
            role: Role::User,
            is_board_member: false,
        }
    }

    #[test]
    fn creation_normalizes_email_and_name() {
        let user = new_user("  Sokha.Lind@Example.SE ").into_user(Utc::now()).unwrap();
        assert_eq!(user.email, "sokha.lind@example.se");
        assert_eq!(user.display_name.as_deref(), Some("Sokha Lind"));
        assert!(user.is_active);
    }

    #[test]
    fn blank_display_name_becomes_none() {
        let mut input = new_user("a@x.se");
        input.display_name = Some("   ".to_string());
        let user = input.into_user(Utc::now()).unwrap();
        assert_eq!(user.display_name, None);
    }

    #[test]
    fn rejects_malformed_emails() {
        for bad in ["", "no-at-sign", "@x.se", "a@", "a@nodot", "a b@x.se"] {
            assert!(new_user(bad).into_user(Utc::now()).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn password_hash_never_serializes() {
        let user = new_user("a@x.se").into_user(Utc::now()).unwrap();
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
    }
}
