//! API-side capability gate.
//!
//! Enforced at the route boundary, before any engine call. Denials are
//! security-relevant: they are logged with the actor and the missing
//! capability, then surfaced as a 403.

use medlem_auth::{authorize, AuthzError, Capability};

use crate::context::ActorContext;

/// Check the acting identity against a required capability.
pub fn require(actor: &ActorContext, capability: Capability) -> Result<(), AuthzError> {
    match authorize(actor.permissions(), capability) {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::warn!(
                actor = %actor.user_id(),
                role = %actor.role(),
                capability = %capability,
                "authorization denied"
            );
            Err(e)
        }
    }
}
