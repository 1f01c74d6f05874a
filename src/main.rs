use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_sessions::ExpiredDeletion;
use tower_sessions_sqlx_store::SqliteStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sample_app::{
    api::{create_router, AppState, RateLimiter},
    config::Config,
    crypto::Hasher,
    db,
    error::AppError,
};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sample_app=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Sample App server v{}...", env!("CARGO_PKG_VERSION"));

    let config = Arc::new(Config::from_env()?);
    tracing::info!("Configuration loaded");

    let pool = db::connect(&config).await?;
    tracing::info!("Database connected and migrated: {}", config.database_url);

    let session_store = SqliteStore::new(pool.clone());
    session_store.migrate().await?;
    tracing::info!("Session store ready");

    let hasher = Hasher::new(config.argon2_memory_kib, config.argon2_iterations)?;

    let rate_limiter = Arc::new(RateLimiter::new(
        config.rate_limit_max_requests,
        config.rate_limit_window_secs,
    ));
    tracing::info!(
        "Rate limiter configured ({} req per {}s per IP)",
        config.rate_limit_max_requests,
        config.rate_limit_window_secs
    );

    let state = AppState {
        db: pool,
        hasher,
        config: config.clone(),
    };

    // Expired session records
    {
        let store = session_store.clone();
        let period = Duration::from_secs(config.session_cleanup_secs);
        tokio::spawn(async move {
            if let Err(e) = store.continuously_delete_expired(period).await {
                tracing::error!("Session cleanup stopped: {}", e);
            }
        });
        tracing::info!("Session cleanup task started (every {}s)", config.session_cleanup_secs);
    }

    // Rate limiter buckets
    {
        let limiter = rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(300));
            loop {
                interval.tick().await;
                limiter.cleanup().await;
                tracing::debug!("Rate limiter cache cleaned up");
            }
        });
    }

    let app = create_router(state, session_store, rate_limiter)?;

    let addr = config.server_address();
    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .map_err(|e| AppError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
