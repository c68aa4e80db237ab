use sqlx::types::Json;
use sqlx::PgPool;

use crate::db::models::AuditLog;

const COLUMNS: &str = "id, actor_id, action, target_type, target_id, details, created_at";

pub(crate) struct NewAuditLog<'a> {
    pub(crate) actor_id: &'a str,
    pub(crate) action: &'a str,
    pub(crate) target_type: &'a str,
    pub(crate) target_id: &'a str,
    pub(crate) details: serde_json::Value,
    pub(crate) now: time::PrimitiveDateTime,
}

pub(crate) async fn insert(
    executor: impl sqlx::PgExecutor<'_>,
    entry: NewAuditLog<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO audit_logs (id, actor_id, action, target_type, target_id, details, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(entry.actor_id)
    .bind(entry.action)
    .bind(entry.target_type)
    .bind(entry.target_id)
    .bind(Json(entry.details))
    .bind(entry.now)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn list(
    pool: &PgPool,
    skip: i64,
    limit: i64,
) -> Result<Vec<AuditLog>, sqlx::Error> {
    sqlx::query_as::<_, AuditLog>(&format!(
        "SELECT {COLUMNS} FROM audit_logs ORDER BY created_at DESC, id OFFSET $1 LIMIT $2"
    ))
    .bind(skip)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub(crate) async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM audit_logs").fetch_one(pool).await
}

/// Detaches the actor from past entries so the log survives account deletion.
pub(crate) async fn clear_actor(
    executor: impl sqlx::PgExecutor<'_>,
    actor_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE audit_logs SET actor_id = NULL WHERE actor_id = $1")
        .bind(actor_id)
        .execute(executor)
        .await?;
    Ok(())
}
