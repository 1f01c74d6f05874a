use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::Serialize;
use tower_sessions::Session;

use crate::api::middleware::Viewer;
use crate::api::state::AppState;
use crate::api::users::PageQuery;
use crate::api::views::{render, MicropostItem, Page, Pagination, Profile, BASE_TITLE};
use crate::db::{MicropostRepository, PageRequest, User};
use crate::error::AppError;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Debug, Serialize)]
pub struct VisitorHome {
    pub signup_href: &'static str,
}

#[derive(Debug, Serialize)]
pub struct MicropostFormBody {
    pub action: &'static str,
    pub content: String,
    pub errors: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct MemberHome {
    pub user: Profile,
    pub micropost_form: MicropostFormBody,
    pub feed: Vec<MicropostItem>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum HomeBody {
    Visitor(VisitorHome),
    Member(MemberHome),
}

/// The signed-in home page: own profile summary, post form and feed.
pub async fn member_home(
    state: &AppState,
    user: &User,
    page: PageRequest,
    draft: String,
    errors: Vec<String>,
) -> Result<MemberHome, AppError> {
    let feed = MicropostRepository::list_for_user(&state.db, user.id, page).await?;
    let total = MicropostRepository::count_for_user(&state.db, user.id).await?;

    Ok(MemberHome {
        user: Profile::new(user, total),
        micropost_form: MicropostFormBody {
            action: "/microposts",
            content: draft,
            errors,
        },
        feed: feed
            .iter()
            .map(|post| MicropostItem::new(post, Some(user)))
            .collect(),
        pagination: Pagination::new(page, total),
    })
}

/// GET /
pub async fn home(
    State(state): State<AppState>,
    session: Session,
    Extension(viewer): Extension<Viewer>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<HomeBody>>, AppError> {
    match viewer.user() {
        Some(user) => {
            let page = query.request(state.config.per_page);
            let home = member_home(&state, user, page, String::new(), Vec::new()).await?;
            render(&session, Some(user), "", user.name.clone(), HomeBody::Member(home)).await
        }
        None => {
            let body = HomeBody::Visitor(VisitorHome { signup_href: "/signup" });
            render(&session, None, "", BASE_TITLE, body).await
        }
    }
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
