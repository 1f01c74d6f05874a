use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Extension, Form, Json,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::api::middleware::Viewer;
use crate::api::session::{self, Flash};
use crate::api::state::AppState;
use crate::api::views::{render, user_path, Page};
use crate::db::{User, UserRepository};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct SigninForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SigninBody {
    pub email: String,
    pub action: &'static str,
    pub signup_href: &'static str,
}

impl SigninBody {
    fn with_email(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            action: "/sessions",
            signup_href: "/signup",
        }
    }
}

/// Looks the user up by email and checks the password.
///
/// Both failure modes collapse into `InvalidCredentials` so the caller
/// never learns which half was wrong.
pub async fn authenticate(state: &AppState, email: &str, password: &str) -> Result<User, AppError> {
    let user = UserRepository::get_by_email(&state.db, email)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !state.hasher.verify_password(password, &user.password_hash)? {
        return Err(AppError::InvalidCredentials);
    }

    Ok(user)
}

/// GET /signin
pub async fn signin_page(
    session: Session,
    Extension(viewer): Extension<Viewer>,
) -> Result<Json<Page<SigninBody>>, AppError> {
    render(&session, viewer.user(), "Sign in", "Sign in", SigninBody::with_email("")).await
}

/// POST /sessions
pub async fn signin(
    State(state): State<AppState>,
    session: Session,
    Extension(viewer): Extension<Viewer>,
    Form(form): Form<SigninForm>,
) -> Result<Response, AppError> {
    let user = match authenticate(&state, &form.email, &form.password).await {
        Ok(user) => user,
        Err(AppError::InvalidCredentials) => {
            tracing::info!("sign-in rejected");
            // The error is shown on this render only, never stored.
            let page = Page::new(
                viewer.user(),
                "Sign in",
                "Sign in",
                Some(Flash::error(AppError::InvalidCredentials.to_string())),
                SigninBody::with_email(form.email.trim()),
            );
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(page)).into_response());
        }
        Err(e) => return Err(e),
    };

    let return_to = session::take_return_to(&session).await?;
    // A pending "Please sign in." no longer applies.
    session::take_flash(&session).await?;
    session::sign_in(&session, user.id).await?;

    tracing::info!(user_id = user.id, forwarded = return_to.is_some(), "user signed in");

    let target = return_to.unwrap_or_else(|| user_path(user.id));
    Ok(Redirect::to(&target).into_response())
}

/// DELETE /signout
pub async fn signout(session: Session) -> Result<Redirect, AppError> {
    session::sign_out(&session).await?;
    Ok(Redirect::to("/signin"))
}
