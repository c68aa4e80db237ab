use sqlx::PgPool;

use crate::db::models::Comment;

const COLUMNS: &str = "id, lesson_id, user_id, body, hidden, created_at";

pub(crate) async fn create(
    pool: &PgPool,
    lesson_id: &str,
    user_id: &str,
    body: &str,
    now: time::PrimitiveDateTime,
) -> Result<Comment, sqlx::Error> {
    sqlx::query_as::<_, Comment>(&format!(
        "INSERT INTO comments (id, lesson_id, user_id, body, hidden, created_at)
         VALUES ($1, $2, $3, $4, FALSE, $5)
         RETURNING {COLUMNS}"
    ))
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(lesson_id)
    .bind(user_id)
    .bind(body)
    .bind(now)
    .fetch_one(pool)
    .await
}

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Comment>, sqlx::Error> {
    sqlx::query_as::<_, Comment>(&format!("SELECT {COLUMNS} FROM comments WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list_visible(
    pool: &PgPool,
    lesson_id: &str,
) -> Result<Vec<Comment>, sqlx::Error> {
    sqlx::query_as::<_, Comment>(&format!(
        "SELECT {COLUMNS} FROM comments
         WHERE lesson_id = $1 AND hidden = FALSE
         ORDER BY created_at, id"
    ))
    .bind(lesson_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn set_hidden(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    hidden: bool,
) -> Result<Option<Comment>, sqlx::Error> {
    sqlx::query_as::<_, Comment>(&format!(
        "UPDATE comments SET hidden = $1 WHERE id = $2 RETURNING {COLUMNS}"
    ))
    .bind(hidden)
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn delete(pool: &PgPool, id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM comments WHERE id = $1").bind(id).execute(pool).await?;
    Ok(result.rows_affected())
}
