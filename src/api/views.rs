//! JSON view models returned by page routes.
//!
//! Every page shares the same envelope: a title, the header navigation for
//! the current viewer, a heading, an optional flash and the page body.

use axum::Json;
use serde::Serialize;
use tower_sessions::Session;

use crate::api::session::{self, Flash};
use crate::crypto::gravatar_url;
use crate::db::{Micropost, PageRequest, User};
use crate::error::AppError;
use crate::policy;

pub const BASE_TITLE: &str = "Sample App";

const AVATAR_SIZE: u32 = 50;
const PROFILE_AVATAR_SIZE: u32 = 80;

pub fn full_title(page_title: &str) -> String {
    if page_title.is_empty() {
        BASE_TITLE.to_string()
    } else {
        format!("{} | {}", BASE_TITLE, page_title)
    }
}

/// `1 micropost`, `2 microposts`, `0 microposts`
pub fn pluralize(count: i64, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{} {}", count, singular)
    } else {
        format!("{} {}", count, plural)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavLink {
    pub label: &'static str,
    pub href: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<&'static str>,
}

impl NavLink {
    fn get(label: &'static str, href: impl Into<String>) -> Self {
        Self { label, href: href.into(), method: None }
    }
}

pub fn navigation(viewer: Option<&User>) -> Vec<NavLink> {
    let mut links = vec![NavLink::get("Home", "/")];

    match viewer {
        Some(user) => {
            links.push(NavLink::get("Users", "/users"));
            links.push(NavLink::get("Profile", user_path(user.id)));
            links.push(NavLink::get("Settings", format!("{}/edit", user_path(user.id))));
            links.push(NavLink {
                label: "Sign out",
                href: "/signout".to_string(),
                method: Some("delete"),
            });
        }
        None => links.push(NavLink::get("Sign in", "/signin")),
    }

    links
}

pub fn user_path(id: i64) -> String {
    format!("/users/{}", id)
}

pub fn micropost_path(id: i64) -> String {
    format!("/microposts/{}", id)
}

#[derive(Debug, Serialize)]
pub struct Page<T: Serialize> {
    pub title: String,
    pub heading: String,
    pub nav: Vec<NavLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flash: Option<Flash>,
    #[serde(flatten)]
    pub body: T,
}

impl<T: Serialize> Page<T> {
    pub fn new(
        viewer: Option<&User>,
        title: &str,
        heading: impl Into<String>,
        flash: Option<Flash>,
        body: T,
    ) -> Self {
        Self {
            title: full_title(title),
            heading: heading.into(),
            nav: navigation(viewer),
            flash,
            body,
        }
    }
}

/// Builds a page and consumes whatever flash the session was holding.
pub async fn render<T: Serialize>(
    session: &Session,
    viewer: Option<&User>,
    title: &str,
    heading: impl Into<String>,
    body: T,
) -> Result<Json<Page<T>>, AppError> {
    let flash = session::take_flash(session).await?;
    Ok(Json(Page::new(viewer, title, heading, flash, body)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
    pub total: i64,
}

impl Pagination {
    pub fn new(request: PageRequest, total: i64) -> Self {
        Self {
            page: request.page,
            per_page: request.per_page,
            total_pages: request.total_pages(total),
            total,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub name: String,
    pub href: String,
    pub gravatar_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_href: Option<String>,
}

impl UserSummary {
    pub fn new(user: &User, viewer: Option<&User>) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            href: user_path(user.id),
            gravatar_url: gravatar_url(&user.email, AVATAR_SIZE),
            delete_href: policy::can_delete_user(viewer, user).then(|| user_path(user.id)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub id: i64,
    pub name: String,
    pub gravatar_url: String,
    pub micropost_count: String,
}

impl Profile {
    pub fn new(user: &User, micropost_count: i64) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            gravatar_url: gravatar_url(&user.email, PROFILE_AVATAR_SIZE),
            micropost_count: pluralize(micropost_count, "micropost", "microposts"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MicropostItem {
    pub id: i64,
    pub content: String,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_href: Option<String>,
}

impl MicropostItem {
    pub fn new(micropost: &Micropost, viewer: Option<&User>) -> Self {
        Self {
            id: micropost.id,
            content: micropost.content.clone(),
            created_at: micropost.created_at,
            delete_href: policy::can_delete_micropost(viewer, micropost)
                .then(|| micropost_path(micropost.id)),
        }
    }
}
