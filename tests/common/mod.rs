#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tower::ServiceExt;
use tower_sessions_sqlx_store::SqliteStore;

use sample_app::api::{create_router, AppState, RateLimiter};
use sample_app::config::Config;
use sample_app::crypto::Hasher;
use sample_app::db::{self, Micropost, MicropostRepository, User, UserChanges, UserRepository};

pub const PASSWORD: &str = "foobar";

pub struct TestApp {
    pub router: Router,
    pub pool: Pool<Sqlite>,
    pub hasher: Hasher,
}

impl TestApp {
    pub async fn spawn() -> Self {
        // A single connection keeps the in-memory database alive and shared.
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .unwrap()
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await
            .unwrap();

        db::migrate(&pool).await.unwrap();
        let store = SqliteStore::new(pool.clone());
        store.migrate().await.unwrap();

        let config = Config {
            argon2_memory_kib: 8,
            argon2_iterations: 1,
            rate_limit_max_requests: 10_000,
            ..Config::default()
        };
        let hasher = Hasher::new(config.argon2_memory_kib, config.argon2_iterations).unwrap();
        let limiter = Arc::new(RateLimiter::new(
            config.rate_limit_max_requests,
            config.rate_limit_window_secs,
        ));

        let state = AppState {
            db: pool.clone(),
            hasher: hasher.clone(),
            config: Arc::new(config),
        };
        let router = create_router(state, store, limiter).unwrap();

        Self { router, pool, hasher }
    }

    pub fn client(&self) -> Client {
        Client {
            router: self.router.clone(),
            cookie: None,
        }
    }

    pub async fn create_user(&self, name: &str, email: &str, admin: bool) -> User {
        let changes = UserChanges {
            name: name.to_string(),
            email: email.to_lowercase(),
            password_hash: self.hasher.hash_password(PASSWORD).unwrap(),
        };
        UserRepository::create(&self.pool, &changes, admin).await.unwrap()
    }

    /// Users named `Person N` with `person-N@example.com` addresses.
    pub async fn create_users(&self, count: usize) -> Vec<User> {
        let mut users = Vec::with_capacity(count);
        for n in 0..count {
            users.push(
                self.create_user(&format!("Person {}", n), &format!("person-{}@example.com", n), false)
                    .await,
            );
        }
        users
    }

    pub async fn create_micropost(&self, user: &User, content: &str) -> Micropost {
        MicropostRepository::create(&self.pool, user.id, content).await.unwrap()
    }

    pub async fn user_count(&self) -> i64 {
        UserRepository::count(&self.pool).await.unwrap()
    }

    pub async fn reload(&self, user: &User) -> Option<User> {
        UserRepository::get_by_id(&self.pool, user.id).await.unwrap()
    }
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: Value,
}

impl TestResponse {
    pub fn redirects_to(&self, path: &str) -> bool {
        self.status == StatusCode::SEE_OTHER && self.location.as_deref() == Some(path)
    }

    pub fn title(&self) -> &str {
        self.body["title"].as_str().unwrap_or_default()
    }

    pub fn nav_labels(&self) -> Vec<String> {
        self.body["nav"]
            .as_array()
            .map(|links| {
                links
                    .iter()
                    .filter_map(|l| l["label"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_link(&self, label: &str, href: &str) -> bool {
        self.body["nav"]
            .as_array()
            .is_some_and(|links| links.iter().any(|l| l["label"] == label && l["href"] == href))
    }

    pub fn flash_message(&self) -> Option<&str> {
        self.body["flash"]["message"].as_str()
    }

    pub fn errors(&self) -> Vec<String> {
        let errors = if self.body["errors"].is_array() {
            &self.body["errors"]
        } else {
            &self.body["micropost_form"]["errors"]
        };
        errors
            .as_array()
            .map(|e| e.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default()
    }
}

/// Carries the session cookie between requests like a browser would.
pub struct Client {
    router: Router,
    cookie: Option<String>,
}

impl Client {
    pub async fn get(&mut self, uri: &str) -> TestResponse {
        self.send(Method::GET, uri, None).await
    }

    pub async fn post(&mut self, uri: &str, form: &[(&str, &str)]) -> TestResponse {
        self.send(Method::POST, uri, Some(form)).await
    }

    pub async fn patch(&mut self, uri: &str, form: &[(&str, &str)]) -> TestResponse {
        self.send(Method::PATCH, uri, Some(form)).await
    }

    pub async fn delete(&mut self, uri: &str) -> TestResponse {
        self.send(Method::DELETE, uri, None).await
    }

    /// Sends `method` with no body and no content type.
    pub async fn bare(&mut self, method: Method, uri: &str) -> TestResponse {
        self.send(method, uri, None).await
    }

    pub async fn sign_in(&mut self, email: &str, password: &str) -> TestResponse {
        self.post("/sessions", &[("email", email), ("password", password)]).await
    }

    pub async fn sign_in_as(&mut self, user: &User) -> TestResponse {
        let response = self.sign_in(&user.email, PASSWORD).await;
        assert_eq!(response.status, StatusCode::SEE_OTHER, "sign-in failed: {:?}", response);
        response
    }

    pub async fn sign_out(&mut self) -> TestResponse {
        self.delete("/signout").await
    }

    async fn send(&mut self, method: Method, uri: &str, form: Option<&[(&str, &str)]>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }

        let request = match form {
            Some(fields) => builder
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(encode_form(fields)))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();

        for value in response.headers().get_all(header::SET_COOKIE) {
            self.store_cookie(value.to_str().unwrap());
        }

        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse { status, location, body }
    }

    fn store_cookie(&mut self, set_cookie: &str) {
        let pair = set_cookie.split(';').next().unwrap_or_default().trim();
        let removed = set_cookie.contains("Max-Age=0");

        match pair.split_once('=') {
            Some((_, value)) if !value.is_empty() && !removed => {
                self.cookie = Some(pair.to_string());
            }
            _ => self.cookie = None,
        }
    }
}

fn encode_form(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn encode(raw: &str) -> String {
    raw.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'*' => {
                (b as char).to_string()
            }
            b' ' => "+".to_string(),
            _ => format!("%{:02X}", b),
        })
        .collect()
}
