use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid email/password combination")]
    InvalidCredentials,

    #[error("The form contains {} error(s)", .0.len())]
    ValidationFailed(Vec<String>),

    #[error("Please sign in.")]
    Unauthorized,

    #[error("Not permitted")]
    Forbidden,

    #[error("You cannot delete yourself.")]
    SelfDeletionDenied,

    #[error("Not found")]
    NotFound,

    #[error("Rate limit exceeded - too many requests")]
    RateLimited,

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("Session store error: {0}")]
    SessionStore(#[from] tower_sessions::session_store::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            // Access-control failures never surface as error pages.
            AppError::Unauthorized => Redirect::to("/signin").into_response(),
            AppError::Forbidden | AppError::SelfDeletionDenied => Redirect::to("/").into_response(),
            AppError::InvalidCredentials => json_error(
                StatusCode::UNPROCESSABLE_ENTITY,
                vec![self.to_string()],
            ),
            AppError::ValidationFailed(errors) => {
                json_error(StatusCode::UNPROCESSABLE_ENTITY, errors)
            }
            AppError::NotFound => json_error(StatusCode::NOT_FOUND, vec![self.to_string()]),
            AppError::RateLimited => {
                json_error(StatusCode::TOO_MANY_REQUESTS, vec![self.to_string()])
            }
            other => {
                tracing::error!("request failed: {}", other);
                json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    vec!["Internal server error".to_string()],
                )
            }
        }
    }
}

fn json_error(status: StatusCode, errors: Vec<String>) -> Response {
    let body = serde_json::json!({
        "errors": errors,
    });

    (status, axum::Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::LOCATION;

    fn location(response: &Response) -> Option<&str> {
        response.headers().get(LOCATION).and_then(|v| v.to_str().ok())
    }

    #[test]
    fn test_access_errors_redirect() {
        let response = AppError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), Some("/signin"));

        let response = AppError::Forbidden.into_response();
        assert_eq!(location(&response), Some("/"));

        let response = AppError::SelfDeletionDenied.into_response();
        assert_eq!(location(&response), Some("/"));
    }

    #[test]
    fn test_form_errors_are_unprocessable() {
        let response = AppError::InvalidCredentials.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response =
            AppError::ValidationFailed(vec!["Name can't be blank".to_string()]).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_validation_message_counts_errors() {
        let err = AppError::ValidationFailed(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "The form contains 2 error(s)");
    }
}
