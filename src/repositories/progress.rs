use crate::db::models::Progress;

const COLUMNS: &str = "id, user_id, course_id, lesson_id, completed, percent, time_spent_sec, \
    created_at, updated_at";

/// Creates the `lesson_id IS NULL` enrollment row unless it already exists.
/// Returns `true` when a row was inserted.
pub(crate) async fn ensure_enrollment(
    executor: impl sqlx::PgExecutor<'_>,
    user_id: &str,
    course_id: &str,
    now: time::PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO progress (
            id, user_id, course_id, lesson_id, completed, percent, time_spent_sec,
            created_at, updated_at
         ) VALUES ($1, $2, $3, NULL, FALSE, 0, 0, $4, $4)
         ON CONFLICT (user_id, course_id) WHERE lesson_id IS NULL DO NOTHING",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(course_id)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn is_enrolled(
    executor: impl sqlx::PgExecutor<'_>,
    user_id: &str,
    course_id: &str,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM progress WHERE user_id = $1 AND course_id = $2)",
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_one(executor)
    .await
}

pub(crate) async fn upsert_lesson(
    executor: impl sqlx::PgExecutor<'_>,
    user_id: &str,
    course_id: &str,
    lesson_id: &str,
    completed: bool,
    time_spent_sec: Option<i32>,
    now: time::PrimitiveDateTime,
) -> Result<Progress, sqlx::Error> {
    let percent = if completed { 100 } else { 0 };
    sqlx::query_as::<_, Progress>(&format!(
        "INSERT INTO progress (
            id, user_id, course_id, lesson_id, completed, percent, time_spent_sec,
            created_at, updated_at
         ) VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, 0), $8, $8)
         ON CONFLICT (user_id, course_id, lesson_id) WHERE lesson_id IS NOT NULL DO UPDATE
         SET completed = EXCLUDED.completed,
             percent = EXCLUDED.percent,
             time_spent_sec = progress.time_spent_sec + COALESCE($7, 0),
             updated_at = EXCLUDED.updated_at
         RETURNING {COLUMNS}"
    ))
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(course_id)
    .bind(lesson_id)
    .bind(completed)
    .bind(percent)
    .bind(time_spent_sec)
    .bind(now)
    .fetch_one(executor)
    .await
}

pub(crate) async fn list_for_course(
    executor: impl sqlx::PgExecutor<'_>,
    user_id: &str,
    course_id: &str,
) -> Result<Vec<Progress>, sqlx::Error> {
    sqlx::query_as::<_, Progress>(&format!(
        "SELECT {COLUMNS} FROM progress
         WHERE user_id = $1 AND course_id = $2 AND lesson_id IS NOT NULL
         ORDER BY created_at, id"
    ))
    .bind(user_id)
    .bind(course_id)
    .fetch_all(executor)
    .await
}

/// Which of `lesson_ids` the user has completed.
pub(crate) async fn completed_lesson_ids(
    executor: impl sqlx::PgExecutor<'_>,
    user_id: &str,
    lesson_ids: &[String],
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT lesson_id FROM progress
         WHERE user_id = $1 AND completed = TRUE AND lesson_id = ANY($2)",
    )
    .bind(user_id)
    .bind(lesson_ids)
    .fetch_all(executor)
    .await
}
