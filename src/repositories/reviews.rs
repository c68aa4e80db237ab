use sqlx::PgPool;

use crate::db::models::Review;

const COLUMNS: &str = "id, course_id, user_id, rating, body, hidden, created_at, updated_at";

pub(crate) async fn upsert(
    pool: &PgPool,
    course_id: &str,
    user_id: &str,
    rating: i32,
    body: Option<&str>,
    now: time::PrimitiveDateTime,
) -> Result<(Review, bool), sqlx::Error> {
    // `xmax = 0` only holds for freshly inserted rows.
    let row = sqlx::query_as::<_, ReviewWithFlag>(&format!(
        "INSERT INTO reviews (id, course_id, user_id, rating, body, hidden, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, FALSE, $6, $6)
         ON CONFLICT (course_id, user_id) DO UPDATE
         SET rating = EXCLUDED.rating, body = EXCLUDED.body, updated_at = EXCLUDED.updated_at
         RETURNING {COLUMNS}, (xmax = 0) AS inserted"
    ))
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(course_id)
    .bind(user_id)
    .bind(rating)
    .bind(body)
    .bind(now)
    .fetch_one(pool)
    .await?;
    Ok((row.review, row.inserted))
}

#[derive(sqlx::FromRow)]
struct ReviewWithFlag {
    #[sqlx(flatten)]
    review: Review,
    inserted: bool,
}

pub(crate) async fn list_visible(
    pool: &PgPool,
    course_id: &str,
) -> Result<Vec<Review>, sqlx::Error> {
    sqlx::query_as::<_, Review>(&format!(
        "SELECT {COLUMNS} FROM reviews
         WHERE course_id = $1 AND hidden = FALSE
         ORDER BY created_at DESC, id"
    ))
    .bind(course_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn set_hidden(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    hidden: bool,
    now: time::PrimitiveDateTime,
) -> Result<Option<Review>, sqlx::Error> {
    sqlx::query_as::<_, Review>(&format!(
        "UPDATE reviews SET hidden = $1, updated_at = $2 WHERE id = $3 RETURNING {COLUMNS}"
    ))
    .bind(hidden)
    .bind(now)
    .bind(id)
    .fetch_optional(executor)
    .await
}
