use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::delete,
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{require_manager, CurrentUser};
use crate::api::lessons::load_lesson;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::schemas::comment::{CommentCreate, CommentResponse};

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/:comment_id", delete(delete_comment))
}

pub(crate) async fn list_comments(
    Path(lesson_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<CommentResponse>>, ApiError> {
    let access = load_lesson(&state, &lesson_id, &user).await?;

    let comments = repositories::comments::list_visible(state.db(), &access.lesson.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list comments"))?;

    Ok(Json(comments.into_iter().map(CommentResponse::from_db).collect()))
}

pub(crate) async fn create_comment(
    Path(lesson_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<CommentCreate>,
) -> Result<(StatusCode, Json<CommentResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let body = payload.body.trim();
    if body.is_empty() {
        return Err(ApiError::BadRequest("Comment must not be empty".to_string()));
    }
    let access = load_lesson(&state, &lesson_id, &user).await?;

    let comment = repositories::comments::create(
        state.db(),
        &access.lesson.id,
        &user.id,
        body,
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create comment"))?;

    Ok((StatusCode::CREATED, Json(CommentResponse::from_db(comment))))
}

async fn delete_comment(
    Path(comment_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let comment = repositories::comments::find_by_id(state.db(), &comment_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load comment"))?
        .ok_or_else(|| ApiError::NotFound("Comment not found".to_string()))?;
    require_manager(&user, &comment.user_id)?;

    repositories::comments::delete(state.db(), &comment.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete comment"))?;

    tracing::info!(comment_id = %comment.id, actor_id = %user.id, "Comment deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests;
