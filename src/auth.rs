//! Authorization checks applied at the top of every facade operation.

use tracing::debug;

use crate::errors::{LendingError, Result};
use crate::types::ActorContext;

/// who may perform an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access<'a> {
    /// any authenticated member or admin
    Member,
    /// admins only
    Admin,
    /// the named member, or an admin
    OwnerOrAdmin(&'a str),
}

pub fn authorize(actor: &ActorContext, operation: &'static str, access: Access<'_>) -> Result<()> {
    if actor.id.trim().is_empty() {
        return Err(LendingError::forbidden("missing actor identity"));
    }

    let allowed = match access {
        Access::Member => true,
        Access::Admin => actor.is_admin(),
        Access::OwnerOrAdmin(owner) => actor.is_admin() || actor.id == owner,
    };

    if allowed {
        Ok(())
    } else {
        debug!(actor = %actor.id, role = ?actor.role, operation, "Operation refused");
        Err(LendingError::forbidden(format!(
            "{} is not allowed to {}",
            actor.id, operation
        )))
    }
}
