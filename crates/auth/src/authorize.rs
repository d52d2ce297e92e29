//! Pure authorization check at the operation boundary.
//!
//! The API layer projects a [`PermissionSet`] once per request and calls
//! [`authorize`] before dispatching any gated operation.

use serde::Serialize;
use thiserror::Error;

use crate::permissions::PermissionSet;

/// A named capability a route can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ManageUsers,
    ManageSettings,
    ApproveMembership,
    ReviewMembership,
    ViewActivity,
    EditOthersContent,
    ModerateContent,
    EditOwnContent,
    ViewDashboard,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ManageUsers => "manage_users",
            Capability::ManageSettings => "manage_settings",
            Capability::ApproveMembership => "approve_membership",
            Capability::ReviewMembership => "review_membership",
            Capability::ViewActivity => "view_activity",
            Capability::EditOthersContent => "edit_others_content",
            Capability::ModerateContent => "moderate_content",
            Capability::EditOwnContent => "edit_own_content",
            Capability::ViewDashboard => "view_dashboard",
        }
    }
}

impl core::fmt::Display for Capability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing capability '{0}'")]
    Forbidden(Capability),
}

impl PermissionSet {
    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::ManageUsers => self.can_manage_users,
            Capability::ManageSettings => self.can_manage_settings,
            Capability::ApproveMembership => self.can_approve_membership,
            Capability::ReviewMembership => self.can_review_membership,
            Capability::ViewActivity => self.can_view_activity,
            Capability::EditOthersContent => self.can_edit_others_content,
            Capability::ModerateContent => self.can_moderate_content,
            Capability::EditOwnContent => self.can_edit_own_content,
            Capability::ViewDashboard => self.can_view_dashboard,
        }
    }
}

/// Check a projected permission set against a required capability.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(permissions: &PermissionSet, required: Capability) -> Result<(), AuthzError> {
    if permissions.allows(required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::Role;

    #[test]
    fn board_member_can_approve() {
        let perms = PermissionSet::project(Role::Board, false);
        assert!(authorize(&perms, Capability::ApproveMembership).is_ok());
    }

    #[test]
    fn plain_user_is_denied_with_named_capability() {
        let perms = PermissionSet::project(Role::User, false);
        let err = authorize(&perms, Capability::ManageUsers).unwrap_err();
        assert_eq!(err, AuthzError::Forbidden(Capability::ManageUsers));
        assert!(err.to_string().contains("manage_users"));
    }
}
