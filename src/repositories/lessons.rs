use sqlx::PgPool;

use crate::db::models::Lesson;

const COLUMNS: &str = "id, module_id, course_id, title, content, duration_min, published, \
    order_index, created_at, updated_at";

pub(crate) struct CreateLesson<'a> {
    pub(crate) id: &'a str,
    pub(crate) module_id: &'a str,
    pub(crate) course_id: &'a str,
    pub(crate) title: &'a str,
    pub(crate) content: &'a str,
    pub(crate) duration_min: i32,
    pub(crate) published: bool,
    pub(crate) order_index: Option<i32>,
    pub(crate) now: time::PrimitiveDateTime,
}

pub(crate) struct UpdateLesson {
    pub(crate) title: Option<String>,
    pub(crate) content: Option<String>,
    pub(crate) duration_min: Option<i32>,
    pub(crate) published: Option<bool>,
    pub(crate) order_index: Option<i32>,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(pool: &PgPool, params: CreateLesson<'_>) -> Result<Lesson, sqlx::Error> {
    sqlx::query_as::<_, Lesson>(&format!(
        "INSERT INTO lessons (
            id, module_id, course_id, title, content, duration_min, published,
            order_index, created_at, updated_at
         ) VALUES (
            $1, $2, $3, $4, $5, $6, $7,
            COALESCE($8, (SELECT COALESCE(MAX(order_index) + 1, 0)
                          FROM lessons WHERE module_id = $2)),
            $9, $9
         )
         RETURNING {COLUMNS}"
    ))
    .bind(params.id)
    .bind(params.module_id)
    .bind(params.course_id)
    .bind(params.title)
    .bind(params.content)
    .bind(params.duration_min)
    .bind(params.published)
    .bind(params.order_index)
    .bind(params.now)
    .fetch_one(pool)
    .await
}

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<Lesson>, sqlx::Error> {
    sqlx::query_as::<_, Lesson>(&format!("SELECT {COLUMNS} FROM lessons WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn list_by_course(
    pool: &PgPool,
    course_id: &str,
) -> Result<Vec<Lesson>, sqlx::Error> {
    sqlx::query_as::<_, Lesson>(&format!(
        "SELECT {COLUMNS} FROM lessons
         WHERE course_id = $1
         ORDER BY order_index, created_at, id"
    ))
    .bind(course_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_published_ids_by_course(
    executor: impl sqlx::PgExecutor<'_>,
    course_id: &str,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT id FROM lessons WHERE course_id = $1 AND published = TRUE",
    )
    .bind(course_id)
    .fetch_all(executor)
    .await
}

/// Returns `(id, title)` pairs for the given lessons, in the order of `ids`.
pub(crate) async fn find_titles(
    executor: impl sqlx::PgExecutor<'_>,
    ids: &[String],
) -> Result<Vec<(String, String)>, sqlx::Error> {
    sqlx::query_as::<_, (String, String)>(
        "SELECT l.id, l.title
         FROM unnest($1::text[]) WITH ORDINALITY AS wanted(id, position)
         JOIN lessons l ON l.id = wanted.id
         ORDER BY wanted.position",
    )
    .bind(ids)
    .fetch_all(executor)
    .await
}

/// Number of `ids` that belong to `course_id`.
pub(crate) async fn count_in_course(
    pool: &PgPool,
    course_id: &str,
    ids: &[String],
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM lessons WHERE course_id = $1 AND id = ANY($2)")
        .bind(course_id)
        .bind(ids)
        .fetch_one(pool)
        .await
}

pub(crate) async fn update(
    pool: &PgPool,
    id: &str,
    params: UpdateLesson,
) -> Result<Option<Lesson>, sqlx::Error> {
    sqlx::query_as::<_, Lesson>(&format!(
        "UPDATE lessons SET
            title = COALESCE($1, title),
            content = COALESCE($2, content),
            duration_min = COALESCE($3, duration_min),
            published = COALESCE($4, published),
            order_index = COALESCE($5, order_index),
            updated_at = $6
         WHERE id = $7
         RETURNING {COLUMNS}"
    ))
    .bind(params.title)
    .bind(params.content)
    .bind(params.duration_min)
    .bind(params.published)
    .bind(params.order_index)
    .bind(params.updated_at)
    .bind(id)
    .fetch_optional(pool)
    .await
}
