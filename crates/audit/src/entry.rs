//! Activity entry and query filter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use medlem_core::UserId;

/// One immutable audit record.
///
/// `action` follows the `resource.verb` convention (e.g.
/// `membership_request.approve`, `user.deactivate`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: Uuid,
    pub actor: UserId,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub description: String,
    /// Value snapshot before the mutation, where one exists.
    pub before: Option<JsonValue>,
    /// Value snapshot after the mutation, where one exists.
    pub after: Option<JsonValue>,
    pub occurred_at: DateTime<Utc>,
}

impl ActivityEntry {
    /// Build an entry stamped with a fresh id and the current time.
    pub fn new(
        actor: UserId,
        action: impl Into<String>,
        resource_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            actor,
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id: None,
            description: description.into(),
            before: None,
            after: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn with_resource_id(mut self, id: impl ToString) -> Self {
        self.resource_id = Some(id.to_string());
        self
    }

    pub fn with_before(mut self, value: JsonValue) -> Self {
        self.before = Some(value);
        self
    }

    pub fn with_after(mut self, value: JsonValue) -> Self {
        self.after = Some(value);
        self
    }
}

/// Query filter; all fields are AND-ed, `None` means "don't care".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityFilter {
    pub actor: Option<UserId>,
    /// Substring match on the action string.
    pub action_contains: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub occurred_after: Option<DateTime<Utc>>,
    pub occurred_before: Option<DateTime<Utc>>,
}

impl ActivityFilter {
    /// Whether `entry` matches every set criterion.
    pub fn matches(&self, entry: &ActivityEntry) -> bool {
        if let Some(actor) = self.actor {
            if entry.actor != actor {
                return false;
            }
        }
        if let Some(needle) = &self.action_contains {
            if !entry.action.contains(needle.as_str()) {
                return false;
            }
        }
        if let Some(rt) = &self.resource_type {
            if &entry.resource_type != rt {
                return false;
            }
        }
        if let Some(rid) = &self.resource_id {
            if entry.resource_id.as_deref() != Some(rid.as_str()) {
                return false;
            }
        }
        if let Some(after) = self.occurred_after {
            if entry.occurred_at < after {
                return false;
            }
        }
        if let Some(before) = self.occurred_before {
            if entry.occurred_at > before {
                return false;
            }
        }
        true
    }
}
