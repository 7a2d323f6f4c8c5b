//! Access policies applied before any state-changing operation

use crate::{
    error::{AppError, AppResult},
    models::user::UserClaims,
};

/// Kind of access requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPolicy {
    /// Anyone may read; only administrators may write (catalog)
    AdminOrReadOnly,
    /// Only the owning user or an administrator (borrowings, payments)
    OwnerOrAdmin { owner_id: i32 },
}

impl AccessPolicy {
    pub fn authorize(&self, actor: Option<&UserClaims>, access: Access) -> AppResult<()> {
        match (self, access) {
            (AccessPolicy::AdminOrReadOnly, Access::Read) => Ok(()),
            (AccessPolicy::AdminOrReadOnly, Access::Write) => require_actor(actor)?.require_admin(),
            (AccessPolicy::OwnerOrAdmin { owner_id }, _) => {
                let actor = require_actor(actor)?;
                if actor.is_admin() || actor.user_id == *owner_id {
                    Ok(())
                } else {
                    Err(AppError::Authorization(
                        "You do not have permission to perform this action".to_string(),
                    ))
                }
            }
        }
    }
}

fn require_actor(actor: Option<&UserClaims>) -> AppResult<&UserClaims> {
    actor.ok_or_else(|| {
        AppError::Authentication("Authentication credentials were not provided".to_string())
    })
}
