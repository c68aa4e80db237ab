use sqlx::PgPool;

use crate::db::models::Reservation;
use crate::db::types::ReservationStatus;

const COLUMNS: &str = "id, workshop_id, user_id, status, created_at, updated_at";

pub(crate) async fn find(
    executor: impl sqlx::PgExecutor<'_>,
    workshop_id: &str,
    user_id: &str,
) -> Result<Option<Reservation>, sqlx::Error> {
    sqlx::query_as::<_, Reservation>(&format!(
        "SELECT {COLUMNS} FROM reservations WHERE workshop_id = $1 AND user_id = $2"
    ))
    .bind(workshop_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

/// Inserts a RESERVED row, or flips the existing (workshop, user) row back to RESERVED.
pub(crate) async fn upsert_reserved(
    executor: impl sqlx::PgExecutor<'_>,
    workshop_id: &str,
    user_id: &str,
    now: time::PrimitiveDateTime,
) -> Result<Reservation, sqlx::Error> {
    sqlx::query_as::<_, Reservation>(&format!(
        "INSERT INTO reservations (id, workshop_id, user_id, status, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $5)
         ON CONFLICT (workshop_id, user_id) DO UPDATE
         SET status = EXCLUDED.status, updated_at = EXCLUDED.updated_at
         RETURNING {COLUMNS}"
    ))
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(workshop_id)
    .bind(user_id)
    .bind(ReservationStatus::Reserved)
    .bind(now)
    .fetch_one(executor)
    .await
}

pub(crate) async fn set_status(
    executor: impl sqlx::PgExecutor<'_>,
    workshop_id: &str,
    user_id: &str,
    status: ReservationStatus,
    now: time::PrimitiveDateTime,
) -> Result<Option<Reservation>, sqlx::Error> {
    sqlx::query_as::<_, Reservation>(&format!(
        "UPDATE reservations SET status = $1, updated_at = $2
         WHERE workshop_id = $3 AND user_id = $4
         RETURNING {COLUMNS}"
    ))
    .bind(status)
    .bind(now)
    .bind(workshop_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn reserved_user_ids(
    pool: &PgPool,
    workshop_id: &str,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT user_id FROM reservations WHERE workshop_id = $1 AND status = $2 ORDER BY created_at",
    )
    .bind(workshop_id)
    .bind(ReservationStatus::Reserved)
    .fetch_all(pool)
    .await
}
