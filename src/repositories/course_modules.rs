use sqlx::PgPool;

use crate::db::models::CourseModule;

const COLUMNS: &str = "id, course_id, title, order_index, created_at";

pub(crate) async fn create(
    pool: &PgPool,
    id: &str,
    course_id: &str,
    title: &str,
    order_index: Option<i32>,
    now: time::PrimitiveDateTime,
) -> Result<CourseModule, sqlx::Error> {
    // A missing order index appends the module after the current last one.
    sqlx::query_as::<_, CourseModule>(&format!(
        "INSERT INTO course_modules (id, course_id, title, order_index, created_at)
         VALUES (
            $1, $2, $3,
            COALESCE($4, (SELECT COALESCE(MAX(order_index) + 1, 0)
                          FROM course_modules WHERE course_id = $2)),
            $5
         )
         RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(course_id)
    .bind(title)
    .bind(order_index)
    .bind(now)
    .fetch_one(pool)
    .await
}

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<CourseModule>, sqlx::Error> {
    sqlx::query_as::<_, CourseModule>(&format!("SELECT {COLUMNS} FROM course_modules WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Modules in unlock order; ties on `order_index` fall back to creation order.
pub(crate) async fn list_by_course(
    pool: &PgPool,
    course_id: &str,
) -> Result<Vec<CourseModule>, sqlx::Error> {
    sqlx::query_as::<_, CourseModule>(&format!(
        "SELECT {COLUMNS} FROM course_modules
         WHERE course_id = $1
         ORDER BY order_index, created_at, id"
    ))
    .bind(course_id)
    .fetch_all(pool)
    .await
}
