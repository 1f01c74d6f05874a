use sqlx::{Pool, Sqlite};

use crate::db::models::{PageRequest, User, UserChanges};
use crate::error::AppError;

pub const EMAIL_TAKEN: &str = "Email has already been taken";

/// A unique-index hit on `email` is a form error, not a server fault.
fn map_unique_email(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::ValidationFailed(vec![EMAIL_TAKEN.to_string()])
        }
        _ => AppError::Database(err),
    }
}

pub struct UserRepository;

impl UserRepository {
    pub async fn create(
        pool: &Pool<Sqlite>,
        changes: &UserChanges,
        admin: bool,
    ) -> Result<User, AppError> {
        let now = chrono::Utc::now().timestamp();

        let user = sqlx::query_as::<_, User>(
            r#"
INSERT INTO users (name, email, password_hash, admin, created_at, updated_at)
VALUES (?, ?, ?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(&changes.name)
        .bind(&changes.email)
        .bind(&changes.password_hash)
        .bind(admin)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(map_unique_email)?;

        Ok(user)
    }

    /// Updates profile fields only; the admin flag is never written here.
    pub async fn update_profile(
        pool: &Pool<Sqlite>,
        id: i64,
        changes: &UserChanges,
    ) -> Result<Option<User>, AppError> {
        let now = chrono::Utc::now().timestamp();

        let user = sqlx::query_as::<_, User>(
            r#"
UPDATE users
SET name = ?, email = ?, password_hash = ?, updated_at = ?
WHERE id = ?
RETURNING *
            "#,
        )
        .bind(&changes.name)
        .bind(&changes.email)
        .bind(&changes.password_hash)
        .bind(now)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(map_unique_email)?;

        Ok(user)
    }

    pub async fn get_by_email(
        pool: &Pool<Sqlite>,
        email: &str,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email.trim().to_ascii_lowercase())
            .fetch_optional(pool)
            .await?;

        Ok(user)
    }

    pub async fn get_by_id(pool: &Pool<Sqlite>, id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(user)
    }

    /// True when another user (not `except_id`) already owns the email
    pub async fn email_taken(
        pool: &Pool<Sqlite>,
        email: &str,
        except_id: Option<i64>,
    ) -> Result<bool, AppError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = ? AND id != ?")
                .bind(email.trim().to_ascii_lowercase())
                .bind(except_id.unwrap_or(-1))
                .fetch_one(pool)
                .await?;

        Ok(count > 0)
    }

    pub async fn list(pool: &Pool<Sqlite>, page: PageRequest) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id ASC LIMIT ? OFFSET ?")
            .bind(page.per_page)
            .bind(page.offset())
            .fetch_all(pool)
            .await?;

        Ok(users)
    }

    pub async fn count(pool: &Pool<Sqlite>) -> Result<i64, AppError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    /// Removes the user and, through the foreign key, their microposts.
    pub async fn delete(pool: &Pool<Sqlite>, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
