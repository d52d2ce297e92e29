//! Approved association member record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use medlem_core::{MemberId, RequestId, UserId};

use crate::numbering::MemberNumber;
use crate::request::MembershipKind;

/// An approved, numbered member.
///
/// Created only as a side effect of request approval. `user_id` stays `None`
/// until a login account is provisioned, either during approval or later via
/// the remediation path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub number: MemberNumber,
    pub email: String,
    pub full_name: String,
    pub user_id: Option<UserId>,
    pub kind: MembershipKind,
    pub is_active: bool,
    pub joined_at: DateTime<Utc>,
    /// The request this member was created from.
    pub created_from: RequestId,
}

impl Member {
    pub fn has_account(&self) -> bool {
        self.user_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_linking_is_observable() {
        let mut member = Member {
            id: MemberId::new(),
            number: MemberNumber::new(2025, 1),
            email: "dara@example.se".to_string(),
            full_name: "Dara Svensson".to_string(),
            user_id: None,
            kind: MembershipKind::Individual,
            is_active: true,
            joined_at: Utc::now(),
            created_from: RequestId::new(),
        };
        assert!(!member.has_account());

        member.user_id = Some(UserId::new());
        assert!(member.has_account());
    }
}
