use sqlx::{Pool, Sqlite};

use crate::db::models::{Micropost, PageRequest};
use crate::error::AppError;

pub struct MicropostRepository;

impl MicropostRepository {
    pub async fn create(
        pool: &Pool<Sqlite>,
        user_id: i64,
        content: &str,
    ) -> Result<Micropost, AppError> {
        let created_at = chrono::Utc::now().timestamp();

        let micropost = sqlx::query_as::<_, Micropost>(
            r#"
INSERT INTO microposts (user_id, content, created_at)
VALUES (?, ?, ?)
RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(content)
        .bind(created_at)
        .fetch_one(pool)
        .await?;

        Ok(micropost)
    }

    pub async fn get_by_id(pool: &Pool<Sqlite>, id: i64) -> Result<Option<Micropost>, AppError> {
        let micropost = sqlx::query_as::<_, Micropost>("SELECT * FROM microposts WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(micropost)
    }

    /// Newest first; ties on the timestamp fall back to insertion order.
    pub async fn list_for_user(
        pool: &Pool<Sqlite>,
        user_id: i64,
        page: PageRequest,
    ) -> Result<Vec<Micropost>, AppError> {
        let microposts = sqlx::query_as::<_, Micropost>(
            r#"
SELECT * FROM microposts
WHERE user_id = ?
ORDER BY created_at DESC, id DESC
LIMIT ? OFFSET ?
            "#,
        )
        .bind(user_id)
        .bind(page.per_page)
        .bind(page.offset())
        .fetch_all(pool)
        .await?;

        Ok(microposts)
    }

    pub async fn count_for_user(pool: &Pool<Sqlite>, user_id: i64) -> Result<i64, AppError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM microposts WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    pub async fn delete(pool: &Pool<Sqlite>, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM microposts WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
