//! Ownership and role checks.
//!
//! Every check takes the signed-in actor; anonymous requests are turned
//! away earlier by the `require_signin` middleware. A failed check maps to
//! an [`AppError`] that redirects without touching any state.

use crate::db::{Micropost, User};
use crate::error::AppError;

/// Profile edit and update: only the account owner, admins included.
pub fn authorize_profile_change(actor: &User, target_id: i64) -> Result<(), AppError> {
    if actor.id == target_id {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

/// User deletion: admins only, and never their own record.
pub fn authorize_user_destroy(actor: &User, target_id: i64) -> Result<(), AppError> {
    if !actor.admin {
        return Err(AppError::Forbidden);
    }
    if actor.id == target_id {
        return Err(AppError::SelfDeletionDenied);
    }
    Ok(())
}

/// Micropost deletion: the owner only.
pub fn authorize_micropost_destroy(actor: &User, micropost: &Micropost) -> Result<(), AppError> {
    if actor.id == micropost.user_id {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

pub fn can_delete_user(viewer: Option<&User>, target: &User) -> bool {
    viewer.is_some_and(|actor| authorize_user_destroy(actor, target.id).is_ok())
}

pub fn can_delete_micropost(viewer: Option<&User>, micropost: &Micropost) -> bool {
    viewer.is_some_and(|actor| authorize_micropost_destroy(actor, micropost).is_ok())
}

/// Signup is for visitors; a signed-in user resubmitting it is sent home.
pub fn authorize_signup(viewer: Option<&User>) -> Result<(), AppError> {
    match viewer {
        None => Ok(()),
        Some(_) => Err(AppError::Forbidden),
    }
}
