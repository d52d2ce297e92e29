//! Role hierarchy used for every gated operation.
//!
//! Roles form a fixed total order. Authority comparison is purely positional:
//! a role dominates another exactly when its rank in [`Role::ORDERED`] is at
//! least as high. There is no permission graph at this layer; capability
//! derivation lives in [`crate::permissions`].

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use medlem_core::DomainError;

/// Association role, ordered by authority (lowest first).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Author,
    Moderator,
    Editor,
    Board,
    Admin,
}

impl Role {
    /// All roles, lowest authority first. The index in this array *is* the
    /// authority rank.
    pub const ORDERED: [Role; 6] = [
        Role::User,
        Role::Author,
        Role::Moderator,
        Role::Editor,
        Role::Board,
        Role::Admin,
    ];

    /// Positional authority rank (0 = USER, 5 = ADMIN).
    pub fn authority(&self) -> u8 {
        match self {
            Role::User => 0,
            Role::Author => 1,
            Role::Moderator => 2,
            Role::Editor => 3,
            Role::Board => 4,
            Role::Admin => 5,
        }
    }

    /// Whether this role's authority dominates `required`.
    pub fn has_authority(&self, required: Role) -> bool {
        self.authority() >= required.authority()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Author => "AUTHOR",
            Role::Moderator => "MODERATOR",
            Role::Editor => "EDITOR",
            Role::Board => "BOARD",
            Role::Admin => "ADMIN",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "USER" => Ok(Role::User),
            "AUTHOR" => Ok(Role::Author),
            "MODERATOR" => Ok(Role::Moderator),
            "EDITOR" => Ok(Role::Editor),
            "BOARD" => Ok(Role::Board),
            "ADMIN" => Ok(Role::Admin),
            other => Err(DomainError::invalid_id(format!("unknown role '{other}'"))),
        }
    }
}
