use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Extension, Form, Json,
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::api::middleware::CurrentUser;
use crate::api::pages::{member_home, HomeBody};
use crate::api::session::{self, Flash};
use crate::api::state::AppState;
use crate::api::views::Page;
use crate::db::{MicropostRepository, PageRequest};
use crate::error::AppError;
use crate::policy;

const CONTENT_MAX_LEN: usize = 140;

#[derive(Debug, Default, Deserialize)]
pub struct MicropostForm {
    #[serde(default)]
    pub content: String,
}

/// Validate and trim micropost content
fn validate_content(content: &str) -> Result<String, AppError> {
    let trimmed = content.trim();

    if trimmed.is_empty() {
        return Err(AppError::ValidationFailed(vec![
            "Content can't be blank".to_string(),
        ]));
    }

    if trimmed.chars().count() > CONTENT_MAX_LEN {
        return Err(AppError::ValidationFailed(vec![format!(
            "Content is too long (maximum is {} characters)",
            CONTENT_MAX_LEN
        )]));
    }

    Ok(trimmed.to_string())
}

/// POST /microposts (requires auth)
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Form(form): Form<MicropostForm>,
) -> Result<Response, AppError> {
    let content = match validate_content(&form.content) {
        Ok(content) => content,
        Err(AppError::ValidationFailed(errors)) => {
            let first_page = PageRequest::new(None, state.config.per_page);
            let home = member_home(&state, &me, first_page, form.content, errors).await?;
            let page = Page::new(Some(&me), "", me.name.clone(), None, HomeBody::Member(home));
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(page)).into_response());
        }
        Err(e) => return Err(e),
    };

    let micropost = MicropostRepository::create(&state.db, me.id, &content).await?;

    session::set_flash(&session, Flash::success("Micropost created!")).await?;
    tracing::debug!(user_id = me.id, micropost_id = micropost.id, "micropost created");

    Ok(Redirect::to("/").into_response())
}

/// DELETE /microposts/{id} (owner only)
pub async fn destroy(
    State(state): State<AppState>,
    session: Session,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Redirect, AppError> {
    // Missing and foreign posts are indistinguishable to the caller.
    let micropost = MicropostRepository::get_by_id(&state.db, id)
        .await?
        .ok_or(AppError::Forbidden)?;

    if let Err(e) = policy::authorize_micropost_destroy(&me, &micropost) {
        tracing::warn!(user_id = me.id, micropost_id = id, "micropost deletion refused");
        return Err(e);
    }

    MicropostRepository::delete(&state.db, micropost.id).await?;
    session::set_flash(&session, Flash::success("Micropost deleted.")).await?;

    Ok(Redirect::to("/"))
}
