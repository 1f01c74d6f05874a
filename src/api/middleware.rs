use axum::{
    extract::{ConnectInfo, Request, State},
    http::Method,
    middleware::Next,
    response::Response,
    Extension,
};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tower_sessions::Session;

use crate::api::session::{self, Flash};
use crate::api::state::AppState;
use crate::db::{User, UserRepository};
use crate::error::AppError;

/// Whoever the session says is browsing; `None` for visitors.
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<User>);

impl Viewer {
    pub fn user(&self) -> Option<&User> {
        self.0.as_ref()
    }
}

/// The signed-in user, present only behind `require_signin`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Resolves the session's user id into a `Viewer` on every request
pub async fn identify(
    State(state): State<AppState>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = match session::current_user_id(&session).await? {
        Some(id) => UserRepository::get_by_id(&state.db, id).await?,
        None => None,
    };

    request.extensions_mut().insert(Viewer(user));

    Ok(next.run(request).await)
}

/// Turns visitors away from protected routes.
///
/// GET requests remember where they were headed so sign-in can forward
/// them back there.
pub async fn require_signin(
    session: Session,
    Extension(viewer): Extension<Viewer>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(user) = viewer.0 else {
        if request.method() == Method::GET {
            let location = request
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str())
                .unwrap_or("/");
            session::remember_location(&session, location).await?;
        }
        session::set_flash(&session, Flash::notice("Please sign in.")).await?;

        tracing::info!(
            method = %request.method(),
            path = %request.uri().path(),
            "anonymous request to protected route"
        );
        return Err(AppError::Unauthorized);
    };

    request.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(request).await)
}

/// Simple in-memory rate limiter
/// Tracks requests per IP address and enforces limits
#[derive(Clone)]
pub struct RateLimiter {
    // IP -> (count, window_start)
    state: Arc<Mutex<HashMap<IpAddr, (u32, Instant)>>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(HashMap::new())),
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    pub async fn check(&self, ip: IpAddr) -> bool {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        let entry = state.entry(ip).or_insert((0, now));

        if now.duration_since(entry.1) > self.window {
            *entry = (1, now);
            return true;
        }

        if entry.0 < self.max_requests {
            entry.0 += 1;
            true
        } else {
            false
        }
    }

    /// Periodic cleanup of old entries
    pub async fn cleanup(&self) {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        state.retain(|_, (_, time)| now.duration_since(*time) <= self.window * 2);
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    limiter: Arc<RateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Falls back to loopback when served without connect info (tests).
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

    if !limiter.check(ip).await {
        tracing::warn!(%ip, "rate limit exceeded");
        return Err(AppError::RateLimited);
    }

    Ok(next.run(request).await)
}
