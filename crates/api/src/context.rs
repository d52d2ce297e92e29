use medlem_auth::{PermissionSet, Role};
use medlem_core::UserId;

/// Actor context for a request (authenticated identity + projected
/// capabilities).
///
/// This is immutable and must be present for all gated routes. The
/// permission set is projected once, at authentication time, so every
/// capability check in the request shares one deterministic view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorContext {
    user_id: UserId,
    role: Role,
    is_board_member: bool,
    permissions: PermissionSet,
}

impl ActorContext {
    pub fn new(user_id: UserId, role: Role, is_board_member: bool) -> Self {
        Self {
            user_id,
            role,
            is_board_member,
            permissions: PermissionSet::project(role, is_board_member),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_board_member(&self) -> bool {
        self.is_board_member
    }

    pub fn permissions(&self) -> &PermissionSet {
        &self.permissions
    }
}
