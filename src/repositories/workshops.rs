use sqlx::PgPool;

use crate::db::models::Workshop;
use crate::db::types::{ReservationStatus, SkillLevel};

const COLUMNS: &str = "id, instructor_id, course_id, title, description, location, start_time, \
    duration_min, capacity, skill_level, created_at, updated_at";

pub(crate) struct CreateWorkshop<'a> {
    pub(crate) id: &'a str,
    pub(crate) instructor_id: &'a str,
    pub(crate) course_id: Option<&'a str>,
    pub(crate) title: &'a str,
    pub(crate) description: Option<&'a str>,
    pub(crate) location: Option<&'a str>,
    pub(crate) start_time: time::PrimitiveDateTime,
    pub(crate) duration_min: i32,
    pub(crate) capacity: Option<i32>,
    pub(crate) skill_level: SkillLevel,
    pub(crate) now: time::PrimitiveDateTime,
}

pub(crate) struct UpdateWorkshop {
    pub(crate) title: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) location: Option<String>,
    pub(crate) start_time: Option<time::PrimitiveDateTime>,
    pub(crate) duration_min: Option<i32>,
    /// `Some(None)` clears the capacity (unlimited seats).
    pub(crate) capacity: Option<Option<i32>>,
    pub(crate) skill_level: Option<SkillLevel>,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateWorkshop<'_>,
) -> Result<Workshop, sqlx::Error> {
    sqlx::query_as::<_, Workshop>(&format!(
        "INSERT INTO workshops (
            id, instructor_id, course_id, title, description, location, start_time,
            duration_min, capacity, skill_level, created_at, updated_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$11)
         RETURNING {COLUMNS}"
    ))
    .bind(params.id)
    .bind(params.instructor_id)
    .bind(params.course_id)
    .bind(params.title)
    .bind(params.description)
    .bind(params.location)
    .bind(params.start_time)
    .bind(params.duration_min)
    .bind(params.capacity)
    .bind(params.skill_level)
    .bind(params.now)
    .fetch_one(executor)
    .await
}

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<Workshop>, sqlx::Error> {
    sqlx::query_as::<_, Workshop>(&format!("SELECT {COLUMNS} FROM workshops WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

/// Loads the workshop and holds its row lock until the transaction ends.
pub(crate) async fn lock_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<Workshop>, sqlx::Error> {
    sqlx::query_as::<_, Workshop>(&format!(
        "SELECT {COLUMNS} FROM workshops WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// Who is listing workshops. Managed rows (admin, or the viewer's own) follow
/// `include_ended`; everyone else sees upcoming workshops plus started ones
/// they hold a RESERVED seat for.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ListViewer<'a> {
    pub(crate) user_id: Option<&'a str>,
    pub(crate) is_admin: bool,
    pub(crate) include_ended: bool,
}

pub(crate) async fn list(
    pool: &PgPool,
    now: time::PrimitiveDateTime,
    viewer: ListViewer<'_>,
) -> Result<Vec<Workshop>, sqlx::Error> {
    sqlx::query_as::<_, Workshop>(&format!(
        "SELECT {COLUMNS} FROM workshops w
         WHERE CASE
            WHEN $2 OR w.instructor_id = $3
                THEN $4 OR w.start_time + make_interval(mins => w.duration_min) > $1
            ELSE w.start_time > $1
                OR (w.start_time + make_interval(mins => w.duration_min) > $1
                    AND EXISTS (
                        SELECT 1 FROM reservations r
                        WHERE r.workshop_id = w.id AND r.user_id = $3 AND r.status = $5
                    ))
         END
         ORDER BY w.start_time, w.id"
    ))
    .bind(now)
    .bind(viewer.is_admin)
    .bind(viewer.user_id)
    .bind(viewer.include_ended)
    .bind(ReservationStatus::Reserved)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_starting_between(
    pool: &PgPool,
    from: time::PrimitiveDateTime,
    to: time::PrimitiveDateTime,
) -> Result<Vec<Workshop>, sqlx::Error> {
    sqlx::query_as::<_, Workshop>(&format!(
        "SELECT {COLUMNS} FROM workshops
         WHERE start_time >= $1 AND start_time <= $2
         ORDER BY start_time, id"
    ))
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
}

pub(crate) async fn update(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    params: UpdateWorkshop,
) -> Result<Option<Workshop>, sqlx::Error> {
    let (capacity_set, capacity) = match params.capacity {
        Some(value) => (true, value),
        None => (false, None),
    };
    sqlx::query_as::<_, Workshop>(&format!(
        "UPDATE workshops SET
            title = COALESCE($1, title),
            description = COALESCE($2, description),
            location = COALESCE($3, location),
            start_time = COALESCE($4, start_time),
            duration_min = COALESCE($5, duration_min),
            capacity = CASE WHEN $6 THEN $7 ELSE capacity END,
            skill_level = COALESCE($8, skill_level),
            updated_at = $9
         WHERE id = $10
         RETURNING {COLUMNS}"
    ))
    .bind(params.title)
    .bind(params.description)
    .bind(params.location)
    .bind(params.start_time)
    .bind(params.duration_min)
    .bind(capacity_set)
    .bind(capacity)
    .bind(params.skill_level)
    .bind(params.updated_at)
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn required_lesson_ids(
    executor: impl sqlx::PgExecutor<'_>,
    workshop_id: &str,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT r.lesson_id
         FROM workshop_lesson_requirements r
         JOIN lessons l ON l.id = r.lesson_id
         JOIN course_modules m ON m.id = l.module_id
         WHERE r.workshop_id = $1
         ORDER BY m.order_index, l.order_index, l.title, l.id",
    )
    .bind(workshop_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn replace_requirements(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    workshop_id: &str,
    lesson_ids: &[String],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM workshop_lesson_requirements WHERE workshop_id = $1")
        .bind(workshop_id)
        .execute(&mut **tx)
        .await?;

    sqlx::query(
        "INSERT INTO workshop_lesson_requirements (workshop_id, lesson_id)
         SELECT $1, lesson_id FROM unnest($2::text[]) AS lesson_id
         ON CONFLICT DO NOTHING",
    )
    .bind(workshop_id)
    .bind(lesson_ids)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub(crate) async fn count_reserved(
    executor: impl sqlx::PgExecutor<'_>,
    workshop_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM reservations WHERE workshop_id = $1 AND status = $2")
        .bind(workshop_id)
        .bind(ReservationStatus::Reserved)
        .fetch_one(executor)
        .await
}

pub(crate) async fn delete(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: &str,
) -> Result<u64, sqlx::Error> {
    sqlx::query("DELETE FROM notifications WHERE workshop_id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;
    sqlx::query("DELETE FROM reservations WHERE workshop_id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;
    sqlx::query("DELETE FROM workshop_lesson_requirements WHERE workshop_id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;
    let result = sqlx::query("DELETE FROM workshops WHERE id = $1").bind(id).execute(&mut **tx).await?;
    Ok(result.rows_affected())
}
