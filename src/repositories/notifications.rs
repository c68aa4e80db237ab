use sqlx::types::Json;
use sqlx::PgPool;

/// Records a notification unless one with the same (user, type, workshop) key exists.
/// Returns the new row id, or `None` when another sweep already claimed it.
pub(crate) async fn claim(
    pool: &PgPool,
    user_id: &str,
    kind: &str,
    workshop_id: &str,
    metadata: serde_json::Value,
    now: time::PrimitiveDateTime,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "INSERT INTO notifications (id, user_id, type, workshop_id, metadata, created_at)
         VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (user_id, type, workshop_id) WHERE workshop_id IS NOT NULL DO NOTHING
         RETURNING id",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(kind)
    .bind(workshop_id)
    .bind(Json(metadata))
    .bind(now)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn release(pool: &PgPool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM notifications WHERE id = $1").bind(id).execute(pool).await?;
    Ok(())
}
