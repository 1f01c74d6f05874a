//! Typed access to the browser session.
//!
//! The session holds three keys: the signed-in user id, the URL an
//! anonymous visitor was turned away from, and a one-shot flash message.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::error::AppError;

const USER_ID_KEY: &str = "user_id";
const RETURN_TO_KEY: &str = "return_to";
const FLASH_KEY: &str = "flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Notice,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self { kind: FlashKind::Success, message: message.into() }
    }

    pub fn notice(message: impl Into<String>) -> Self {
        Self { kind: FlashKind::Notice, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { kind: FlashKind::Error, message: message.into() }
    }
}

pub async fn current_user_id(session: &Session) -> Result<Option<i64>, AppError> {
    Ok(session.get::<i64>(USER_ID_KEY).await?)
}

/// Binds the session to `user_id` under a fresh session id.
pub async fn sign_in(session: &Session, user_id: i64) -> Result<(), AppError> {
    session.cycle_id().await?;
    session.insert(USER_ID_KEY, user_id).await?;
    Ok(())
}

/// Drops everything, including any pending forwarding target.
pub async fn sign_out(session: &Session) -> Result<(), AppError> {
    session.flush().await?;
    Ok(())
}

pub async fn remember_location(session: &Session, location: &str) -> Result<(), AppError> {
    session.insert(RETURN_TO_KEY, location.to_string()).await?;
    Ok(())
}

/// Removes and returns the forwarding target. Only same-site paths are
/// honoured.
pub async fn take_return_to(session: &Session) -> Result<Option<String>, AppError> {
    let target = session.remove::<String>(RETURN_TO_KEY).await?;
    Ok(target.filter(|path| is_local_path(path)))
}

pub async fn set_flash(session: &Session, flash: Flash) -> Result<(), AppError> {
    session.insert(FLASH_KEY, flash).await?;
    Ok(())
}

pub async fn take_flash(session: &Session) -> Result<Option<Flash>, AppError> {
    Ok(session.remove::<Flash>(FLASH_KEY).await?)
}

fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.contains('\\')
}
