use std::sync::LazyLock;

use axum::{
    extract::{rejection::FormRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Extension, Form, Json,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::api::middleware::{CurrentUser, Viewer};
use crate::api::session::{self, Flash};
use crate::api::state::AppState;
use crate::api::views::{
    render, user_path, MicropostItem, Page, Pagination, Profile, UserSummary,
};
use crate::crypto::gravatar::{gravatar_url, GRAVATAR_SETTINGS_URL};
use crate::db::users::EMAIL_TAKEN;
use crate::db::{MicropostRepository, PageRequest, User, UserChanges, UserRepository};
use crate::error::AppError;
use crate::policy;

const NAME_MAX_LEN: usize = 50;
const PASSWORD_MIN_LEN: usize = 6;

// ASCII-only classes; `\w` and case folding would otherwise admit Unicode.
static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i-u)^[\w+\-.]+@[a-z\d\-]+(\.[a-z\d\-]+)*\.[a-z]+$").expect("valid email regex")
});

/// Signup and profile edit share the same fields. Anything else in the
/// submission, such as `admin`, is dropped by deserialization.
#[derive(Debug, Default, Deserialize)]
pub struct UserForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirmation: String,
}

/// A missing or unreadable body counts as an empty submission, so access
/// checks run first and validation reports the blank fields.
fn submitted(form: Result<Form<UserForm>, FormRejection>) -> UserForm {
    match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            tracing::debug!(%rejection, "user form treated as empty");
            UserForm::default()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    pub fn request(&self, per_page: i64) -> PageRequest {
        let page = self.page.as_deref().and_then(|p| p.trim().parse().ok());
        PageRequest::new(page, per_page)
    }
}

/// Echo of a user form; passwords are never sent back.
#[derive(Debug, Serialize)]
pub struct UserFormBody {
    pub name: String,
    pub email: String,
    pub action: String,
    pub errors: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct EditBody {
    #[serde(flatten)]
    pub form: UserFormBody,
    pub gravatar_url: String,
    pub gravatar_settings_url: &'static str,
}

#[derive(Debug, Serialize)]
pub struct IndexBody {
    pub users: Vec<UserSummary>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct ProfileBody {
    pub user: Profile,
    pub microposts: Vec<MicropostItem>,
    pub pagination: Pagination,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Field-level checks that need no database access.
pub fn field_errors(form: &UserForm) -> Vec<String> {
    let mut errors = Vec::new();

    let name = form.name.trim();
    if name.is_empty() {
        errors.push("Name can't be blank".to_string());
    } else if name.chars().count() > NAME_MAX_LEN {
        errors.push(format!(
            "Name is too long (maximum is {} characters)",
            NAME_MAX_LEN
        ));
    }

    let email = normalize_email(&form.email);
    if email.is_empty() {
        errors.push("Email can't be blank".to_string());
    } else if !EMAIL_REGEX.is_match(&email) {
        errors.push("Email is invalid".to_string());
    }

    if form.password.chars().count() < PASSWORD_MIN_LEN {
        errors.push(format!(
            "Password is too short (minimum is {} characters)",
            PASSWORD_MIN_LEN
        ));
    }
    if form.password != form.password_confirmation {
        errors.push("Password confirmation doesn't match Password".to_string());
    }

    errors
}

/// Validates the form and hashes the password. `existing_id` excludes the
/// user being edited from the uniqueness check.
async fn validate(
    state: &AppState,
    form: &UserForm,
    existing_id: Option<i64>,
) -> Result<UserChanges, AppError> {
    let mut errors = field_errors(form);
    let email = normalize_email(&form.email);

    if EMAIL_REGEX.is_match(&email)
        && UserRepository::email_taken(&state.db, &email, existing_id).await?
    {
        errors.push(EMAIL_TAKEN.to_string());
    }

    if !errors.is_empty() {
        return Err(AppError::ValidationFailed(errors));
    }

    Ok(UserChanges {
        name: form.name.trim().to_string(),
        email,
        password_hash: state.hasher.hash_password(&form.password)?,
    })
}

fn rejected<T: Serialize>(viewer: Option<&User>, title: &str, heading: &str, body: T) -> Response {
    let page = Page::new(viewer, title, heading, None, body);
    (StatusCode::UNPROCESSABLE_ENTITY, Json(page)).into_response()
}

fn edit_body(user: &User, form: UserFormBody) -> EditBody {
    EditBody {
        form,
        gravatar_url: gravatar_url(&user.email, 80),
        gravatar_settings_url: GRAVATAR_SETTINGS_URL,
    }
}

/// GET /signup
pub async fn signup_page(
    session: Session,
    Extension(viewer): Extension<Viewer>,
) -> Result<Response, AppError> {
    policy::authorize_signup(viewer.user())?;

    let body = UserFormBody {
        name: String::new(),
        email: String::new(),
        action: "/users".to_string(),
        errors: Vec::new(),
    };
    Ok(render(&session, None, "Sign up", "Sign up", body).await?.into_response())
}

/// POST /users
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    Extension(viewer): Extension<Viewer>,
    form: Result<Form<UserForm>, FormRejection>,
) -> Result<Response, AppError> {
    if let Err(e) = policy::authorize_signup(viewer.user()) {
        tracing::warn!("signed-in user attempted signup");
        return Err(e);
    }
    let form = submitted(form);

    let created = async {
        let changes = validate(&state, &form, None).await?;
        UserRepository::create(&state.db, &changes, false).await
    }
    .await;

    let user = match created {
        Ok(user) => user,
        Err(AppError::ValidationFailed(errors)) => {
            let body = UserFormBody {
                name: form.name,
                email: form.email,
                action: "/users".to_string(),
                errors,
            };
            return Ok(rejected(None, "Sign up", "Sign up", body));
        }
        Err(e) => return Err(e),
    };

    session::sign_in(&session, user.id).await?;
    session::set_flash(&session, Flash::success("Welcome to the Sample App!")).await?;

    tracing::info!(user_id = user.id, "user signed up");

    Ok(Redirect::to(&user_path(user.id)).into_response())
}

/// GET /users (requires auth)
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<IndexBody>>, AppError> {
    let page = query.request(state.config.per_page);

    let users = UserRepository::list(&state.db, page).await?;
    let total = UserRepository::count(&state.db).await?;

    let body = IndexBody {
        users: users
            .iter()
            .map(|user| UserSummary::new(user, Some(&me)))
            .collect(),
        pagination: Pagination::new(page, total),
    };

    render(&session, Some(&me), "All users", "All users", body).await
}

/// GET /users/{id}
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<i64>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<ProfileBody>>, AppError> {
    let user = UserRepository::get_by_id(&state.db, id)
        .await?
        .ok_or(AppError::NotFound)?;

    let page = query.request(state.config.per_page);
    let microposts = MicropostRepository::list_for_user(&state.db, user.id, page).await?;
    let total = MicropostRepository::count_for_user(&state.db, user.id).await?;

    let body = ProfileBody {
        user: Profile::new(&user, total),
        microposts: microposts
            .iter()
            .map(|post| MicropostItem::new(post, viewer.user()))
            .collect(),
        pagination: Pagination::new(page, total),
    };

    render(&session, viewer.user(), &user.name, user.name.clone(), body).await
}

/// GET /users/{id}/edit (requires auth)
pub async fn edit(
    session: Session,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<Page<EditBody>>, AppError> {
    if let Err(e) = policy::authorize_profile_change(&me, id) {
        tracing::warn!(user_id = me.id, target = id, "edit of another user's profile refused");
        return Err(e);
    }

    let form = UserFormBody {
        name: me.name.clone(),
        email: me.email.clone(),
        action: user_path(me.id),
        errors: Vec::new(),
    };

    render(&session, Some(&me), "Edit user", "Update your profile", edit_body(&me, form)).await
}

/// PATCH /users/{id} (requires auth)
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Path(id): Path<i64>,
    form: Result<Form<UserForm>, FormRejection>,
) -> Result<Response, AppError> {
    if let Err(e) = policy::authorize_profile_change(&me, id) {
        tracing::warn!(user_id = me.id, target = id, "update of another user's profile refused");
        return Err(e);
    }
    let form = submitted(form);

    let updated = async {
        let changes = validate(&state, &form, Some(me.id)).await?;
        UserRepository::update_profile(&state.db, me.id, &changes).await
    }
    .await;

    let user = match updated {
        Ok(Some(user)) => user,
        Ok(None) => return Err(AppError::NotFound),
        Err(AppError::ValidationFailed(errors)) => {
            let form = UserFormBody {
                name: form.name,
                email: form.email,
                action: user_path(me.id),
                errors,
            };
            return Ok(rejected(
                Some(&me),
                "Edit user",
                "Update your profile",
                edit_body(&me, form),
            ));
        }
        Err(e) => return Err(e),
    };

    session::set_flash(&session, Flash::success("Profile updated")).await?;
    tracing::info!(user_id = user.id, "profile updated");

    Ok(Redirect::to(&user_path(user.id)).into_response())
}

/// DELETE /users/{id} (admin only)
pub async fn destroy(
    State(state): State<AppState>,
    session: Session,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Redirect, AppError> {
    match policy::authorize_user_destroy(&me, id) {
        Ok(()) => {}
        Err(AppError::SelfDeletionDenied) => {
            session::set_flash(&session, Flash::error(AppError::SelfDeletionDenied.to_string()))
                .await?;
            tracing::warn!(user_id = me.id, "admin attempted to delete themself");
            return Err(AppError::SelfDeletionDenied);
        }
        Err(e) => {
            tracing::warn!(user_id = me.id, target = id, "user deletion refused");
            return Err(e);
        }
    }

    if !UserRepository::delete(&state.db, id).await? {
        return Err(AppError::NotFound);
    }

    session::set_flash(&session, Flash::success("User deleted.")).await?;
    tracing::info!(admin_id = me.id, deleted_id = id, "user deleted");

    Ok(Redirect::to("/users"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: &str, email: &str, password: &str, confirmation: &str) -> UserForm {
        UserForm {
            name: name.into(),
            email: email.into(),
            password: password.into(),
            password_confirmation: confirmation.into(),
        }
    }

    #[test]
    fn test_valid_form() {
        assert!(field_errors(&form("Example User", "user@example.com", "foobar", "foobar")).is_empty());
    }

    #[test]
    fn test_blank_form() {
        let errors = field_errors(&UserForm::default());
        assert!(errors.contains(&"Name can't be blank".to_string()));
        assert!(errors.contains(&"Email can't be blank".to_string()));
        assert!(errors.iter().any(|e| e.starts_with("Password is too short")));
    }

    #[test]
    fn test_name_too_long() {
        let errors = field_errors(&form(&"a".repeat(51), "user@example.com", "foobar", "foobar"));
        assert_eq!(errors, vec!["Name is too long (maximum is 50 characters)"]);
    }

    #[test]
    fn test_email_formats() {
        for valid in ["user@foo.COM", "A_US-ER@f.b.org", "frst.lst@foo.jp", "a+b@baz.cn"] {
            assert!(EMAIL_REGEX.is_match(&normalize_email(valid)), "{}", valid);
        }
        for invalid in [
            "user@foo,com",
            "user_at_foo.org",
            "example.user@foo.",
            "foo@bar_baz.com",
            "foo@bar+baz.com",
            "jösé@example.com",
            "user@example.\u{212A}om",
        ] {
            assert!(!EMAIL_REGEX.is_match(&normalize_email(invalid)), "{}", invalid);
        }
    }

    #[test]
    fn test_password_mismatch() {
        let errors = field_errors(&form("Example User", "user@example.com", "foobar", "barfoo"));
        assert_eq!(errors, vec!["Password confirmation doesn't match Password"]);
    }

    #[test]
    fn test_admin_field_is_ignored() {
        let parsed: UserForm = serde_json::from_value(serde_json::json!({
            "name": "Example User",
            "email": "user@example.com",
            "password": "foobar",
            "password_confirmation": "foobar",
            "admin": true,
        }))
        .unwrap();
        assert!(field_errors(&parsed).is_empty());
    }

    #[test]
    fn test_page_query_parsing() {
        let query = PageQuery { page: Some("3".into()) };
        assert_eq!(query.request(30).page, 3);

        let query = PageQuery { page: Some("abc".into()) };
        assert_eq!(query.request(30).page, 1);

        let query = PageQuery { page: None };
        assert_eq!(query.request(30).page, 1);
    }
}
