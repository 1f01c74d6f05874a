use std::sync::Arc;
use sqlx::{Pool, Sqlite};
use crate::config::Config;
use crate::crypto::Hasher;

#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Sqlite>,
    pub hasher: Hasher,
    pub config: Arc<Config>,
}
