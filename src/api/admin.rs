//! Moderation endpoints. Every mutation writes its audit entry in the same
//! transaction as the change itself.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use serde_json::json;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::api::pagination::{PageQuery, PaginatedResponse};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::User;
use crate::repositories;
use crate::repositories::audit_logs::NewAuditLog;
use crate::schemas::admin::{
    AdminUserUpdate, AuditLogResponse, PublishUpdate, UserListQuery, VisibilityUpdate,
};
use crate::schemas::comment::CommentResponse;
use crate::schemas::course::CourseResponse;
use crate::schemas::review::ReviewResponse;
use crate::schemas::user::UserResponse;
use crate::services::deletion::{self, DeletionError};

type Tx<'a> = sqlx::Transaction<'a, sqlx::Postgres>;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:user_id", patch(update_user).delete(delete_user))
        .route("/courses/:course_id", patch(publish_course))
        .route("/reviews/:review_id", patch(moderate_review))
        .route("/comments/:comment_id", patch(moderate_comment))
        .route("/audit-logs", get(list_audit_logs))
}

async fn begin(state: &AppState) -> Result<Tx<'static>, ApiError> {
    state.db().begin().await.map_err(|e| ApiError::internal(e, "Failed to start transaction"))
}

async fn record(
    tx: &mut Tx<'_>,
    admin: &User,
    action: &str,
    target_type: &str,
    target_id: &str,
    details: serde_json::Value,
) -> Result<(), ApiError> {
    repositories::audit_logs::insert(
        &mut **tx,
        NewAuditLog {
            actor_id: &admin.id,
            action,
            target_type,
            target_id,
            details,
            now: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to write audit log"))?;

    tracing::info!(actor_id = %admin.id, action, target_id, "Admin action recorded");
    Ok(())
}

async fn list_users(
    Query(params): Query<UserListQuery>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<PaginatedResponse<UserResponse>>, ApiError> {
    let (skip, limit) = PageQuery { skip: params.skip, limit: params.limit }.normalized();
    let filter =
        repositories::users::UserFilter { role: params.role, is_active: params.is_active };

    let users = repositories::users::list(state.db(), filter, skip, limit)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list users"))?;
    let total_count = repositories::users::count(state.db(), filter)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count users"))?;

    Ok(Json(PaginatedResponse {
        items: users.into_iter().map(UserResponse::from_db).collect(),
        total_count,
        skip,
        limit,
    }))
}

async fn update_user(
    Path(user_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<AdminUserUpdate>,
) -> Result<Json<UserResponse>, ApiError> {
    if payload.role.is_none() && payload.is_active.is_none() {
        return Err(ApiError::BadRequest("Nothing to update".to_string()));
    }
    if user_id == admin.id {
        return Err(ApiError::BadRequest(
            "Admins cannot change their own role or status".to_string(),
        ));
    }

    let mut tx = begin(&state).await?;
    let user = repositories::users::update(
        &mut *tx,
        &user_id,
        repositories::users::UpdateUser {
            full_name: None,
            role: payload.role,
            is_active: payload.is_active,
            hashed_password: None,
            updated_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update user"))?
    .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    record(
        &mut tx,
        &admin,
        "user.update",
        "user",
        &user.id,
        json!({ "role": payload.role, "isActive": payload.is_active }),
    )
    .await?;
    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit user update"))?;

    Ok(Json(UserResponse::from_db(user)))
}

async fn delete_user(
    Path(user_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    if user_id == admin.id {
        return Err(ApiError::BadRequest("Admins cannot delete themselves".to_string()));
    }

    let mut tx = begin(&state).await?;
    let user = repositories::users::find_by_id(&mut *tx, &user_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load user"))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    deletion::delete_user(&mut tx, &user.id).await.map_err(|err| match err {
        DeletionError::NotFound => ApiError::NotFound("User not found".to_string()),
        DeletionError::OwnsCourses(count) => ApiError::Conflict(format!(
            "User still owns {count} courses; reassign or delete them first"
        )),
        DeletionError::Database(e) => ApiError::internal(e, "Failed to delete user"),
    })?;

    record(&mut tx, &admin, "user.delete", "user", &user.id, json!({ "email": user.email }))
        .await?;
    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit user deletion"))?;

    Ok(StatusCode::NO_CONTENT)
}

async fn publish_course(
    Path(course_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<PublishUpdate>,
) -> Result<Json<CourseResponse>, ApiError> {
    let mut tx = begin(&state).await?;
    let course = repositories::courses::update(
        &mut *tx,
        &course_id,
        repositories::courses::UpdateCourse {
            title: None,
            description: None,
            published: Some(payload.published),
            cover_key: None,
            updated_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update course"))?
    .ok_or_else(|| ApiError::NotFound("Course not found".to_string()))?;

    let action = if payload.published { "course.publish" } else { "course.unpublish" };
    record(&mut tx, &admin, action, "course", &course.id, json!({ "slug": course.slug })).await?;
    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit course update"))?;

    Ok(Json(CourseResponse::from_db(course)))
}

async fn moderate_review(
    Path(review_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<VisibilityUpdate>,
) -> Result<Json<ReviewResponse>, ApiError> {
    let mut tx = begin(&state).await?;
    let review =
        repositories::reviews::set_hidden(&mut *tx, &review_id, payload.hidden, primitive_now_utc())
            .await
            .map_err(|e| ApiError::internal(e, "Failed to update review"))?
            .ok_or_else(|| ApiError::NotFound("Review not found".to_string()))?;

    let action = if payload.hidden { "review.hide" } else { "review.unhide" };
    record(&mut tx, &admin, action, "review", &review.id, json!({ "courseId": review.course_id }))
        .await?;
    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit review update"))?;

    Ok(Json(ReviewResponse::from_db(review)))
}

async fn moderate_comment(
    Path(comment_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<VisibilityUpdate>,
) -> Result<Json<CommentResponse>, ApiError> {
    let mut tx = begin(&state).await?;
    let comment = repositories::comments::set_hidden(&mut *tx, &comment_id, payload.hidden)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to update comment"))?
        .ok_or_else(|| ApiError::NotFound("Comment not found".to_string()))?;

    let action = if payload.hidden { "comment.hide" } else { "comment.unhide" };
    record(
        &mut tx,
        &admin,
        action,
        "comment",
        &comment.id,
        json!({ "lessonId": comment.lesson_id }),
    )
    .await?;
    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit comment update"))?;

    Ok(Json(CommentResponse::from_db(comment)))
}

async fn list_audit_logs(
    Query(params): Query<PageQuery>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<PaginatedResponse<AuditLogResponse>>, ApiError> {
    let (skip, limit) = params.normalized();

    let entries = repositories::audit_logs::list(state.db(), skip, limit)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list audit logs"))?;
    let total_count = repositories::audit_logs::count(state.db())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count audit logs"))?;

    Ok(Json(PaginatedResponse {
        items: entries.into_iter().map(AuditLogResponse::from_db).collect(),
        total_count,
        skip,
        limit,
    }))
}

#[cfg(test)]
mod tests;
