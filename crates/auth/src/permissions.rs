//! Capability projection from a role plus the board-membership flag.
//!
//! The projection is declarative: every capability is a threshold on the role
//! lattice, optionally OR-ed with `is_board_member` for board-scoped
//! capabilities. The function is pure and deterministic — identical inputs
//! always yield an identical set, which is the core property the admin layer
//! relies on (and the one the tests pin down).

use serde::{Deserialize, Serialize};

use crate::roles::Role;

/// Flat capability set derived from a user's role and board flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    pub can_manage_users: bool,
    pub can_manage_settings: bool,
    pub can_approve_membership: bool,
    pub can_review_membership: bool,
    pub can_view_activity: bool,
    pub can_edit_others_content: bool,
    pub can_moderate_content: bool,
    pub can_edit_own_content: bool,
    pub can_view_dashboard: bool,
}

impl PermissionSet {
    /// Derive the capability set for `(role, is_board_member)`.
    ///
    /// `is_board_member` is independent of holding the BOARD role: a user may
    /// be flagged as board member while carrying a lower role, which grants
    /// the board-scoped capabilities only.
    pub fn project(role: Role, is_board_member: bool) -> Self {
        let board = role.has_authority(Role::Board) || is_board_member;

        Self {
            can_manage_users: role.has_authority(Role::Admin),
            can_manage_settings: role.has_authority(Role::Admin),
            can_approve_membership: board,
            can_review_membership: board,
            can_view_activity: board,
            can_edit_others_content: role.has_authority(Role::Editor),
            can_moderate_content: role.has_authority(Role::Moderator),
            can_edit_own_content: role.has_authority(Role::Author),
            can_view_dashboard: role.has_authority(Role::Author) || is_board_member,
        }
    }

    #[cfg(test)]
    fn as_flags(&self) -> [bool; 9] {
        [
            self.can_manage_users,
            self.can_manage_settings,
            self.can_approve_membership,
            self.can_review_membership,
            self.can_view_activity,
            self.can_edit_others_content,
            self.can_moderate_content,
            self.can_edit_own_content,
            self.can_view_dashboard,
        ]
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn any_role() -> impl Strategy<Value = Role> {
        prop::sample::select(Role::ORDERED.to_vec())
    }

    #[test]
    fn thresholds_follow_the_role_lattice() {
        let admin = PermissionSet::project(Role::Admin, false);
        assert!(admin.can_manage_users);
        assert!(admin.can_approve_membership);

        let board = PermissionSet::project(Role::Board, false);
        assert!(!board.can_manage_users);
        assert!(board.can_approve_membership);

        let editor = PermissionSet::project(Role::Editor, false);
        assert!(editor.can_edit_others_content);
        assert!(!editor.can_approve_membership);

        let author = PermissionSet::project(Role::Author, false);
        assert!(author.can_edit_own_content);
        assert!(!author.can_edit_others_content);

        let user = PermissionSet::project(Role::User, false);
        assert_eq!(user.as_flags(), [false; 9]);
    }

    #[test]
    fn board_flag_grants_board_scope_only() {
        let flagged = PermissionSet::project(Role::User, true);
        assert!(flagged.can_approve_membership);
        assert!(flagged.can_review_membership);
        assert!(flagged.can_view_activity);
        assert!(flagged.can_view_dashboard);

        // Everything outside the board scope stays role-gated.
        assert!(!flagged.can_manage_users);
        assert!(!flagged.can_edit_others_content);
        assert!(!flagged.can_moderate_content);
        assert!(!flagged.can_edit_own_content);
    }

    proptest! {
        #[test]
        fn projection_is_deterministic(role in any_role(), board in any::<bool>()) {
            let a = PermissionSet::project(role, board);
            let b = PermissionSet::project(role, board);
            prop_assert_eq!(a, b);
        }

        /// A capability granted at some authority level is granted at every
        /// higher level too.
        #[test]
        fn capabilities_are_monotonic_in_authority(a in any_role(), b in any_role(), board in any::<bool>()) {
            if b.has_authority(a) {
                let lower = PermissionSet::project(a, board).as_flags();
                let higher = PermissionSet::project(b, board).as_flags();
                for (l, h) in lower.iter().zip(higher.iter()) {
                    prop_assert!(!l || *h);
                }
            }
        }

        /// Setting the board flag never removes a capability.
        #[test]
        fn board_flag_is_additive(role in any_role()) {
            let plain = PermissionSet::project(role, false).as_flags();
            let flagged = PermissionSet::project(role, true).as_flags();
            for (p, f) in plain.iter().zip(flagged.iter()) {
                prop_assert!(!p || *f);
            }
        }
    }
}
