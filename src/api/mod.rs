pub mod auth;
pub mod microposts;
pub mod middleware;
pub mod pages;
pub mod session;
pub mod state;
pub mod users;
pub mod views;

pub use middleware::RateLimiter;
pub use state::AppState;

use axum::{
    extract::Request,
    middleware::{self as axum_middleware, Next},
    routing::{delete, get, patch, post, MethodRouter},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tower_sessions::{cookie::SameSite, Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::SqliteStore;

use crate::config::Config;
use crate::error::AppError;

/// Puts `require_signin` in front of every method on `route`.
fn signed_in(route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.route_layer(axum_middleware::from_fn(middleware::require_signin))
}

pub fn session_layer(
    store: SqliteStore,
    config: &Config,
) -> Result<SessionManagerLayer<SqliteStore>, AppError> {
    let expiry = match config.session_inactivity_hours {
        Some(hours) => {
            let secs = u64::try_from(hours)
                .map_err(|_| AppError::Config("SESSION_INACTIVITY_HOURS must be >= 0".to_string()))?
                .checked_mul(3600)
                .ok_or_else(|| AppError::Config("SESSION_INACTIVITY_HOURS is out of range".to_string()))?;
            let inactivity = Duration::from_secs(secs)
                .try_into()
                .map_err(|_| AppError::Config("SESSION_INACTIVITY_HOURS is out of range".to_string()))?;
            Expiry::OnInactivity(inactivity)
        }
        None => Expiry::OnSessionEnd,
    };

    Ok(SessionManagerLayer::new(store)
        .with_secure(config.cookie_secure)
        .with_same_site(SameSite::Lax)
        .with_expiry(expiry))
}

pub fn create_router(
    state: AppState,
    session_store: SqliteStore,
    rate_limiter: Arc<RateLimiter>,
) -> Result<Router, AppError> {
    let sessions = session_layer(session_store, &state.config)?;
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    let router = Router::new()
        // Static pages
        .route("/", get(pages::home))
        .route("/health", get(pages::health))

        // Authentication
        .route("/signin", get(auth::signin_page))
        .route("/sessions", post(auth::signin))
        .route("/signout", delete(auth::signout))

        // User directory
        .route("/signup", get(users::signup_page))
        .route("/users", signed_in(get(users::index)).merge(post(users::create)))
        .route(
            "/users/{id}",
            get(users::show).merge(signed_in(patch(users::update).delete(users::destroy))),
        )
        .route("/users/{id}/edit", signed_in(get(users::edit)))

        // Microposts
        .route("/microposts", signed_in(post(microposts::create)))
        .route("/microposts/{id}", signed_in(delete(microposts::destroy)))

        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::identify,
        ))
        .layer(sessions)
        .layer(axum_middleware::from_fn(move |req: Request, next: Next| {
            let limiter = rate_limiter.clone();
            middleware::rate_limit_middleware(limiter, req, next)
        }))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(router)
}
