use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::api::courses::fetch_visible_course;
use crate::api::errors::ApiError;
use crate::api::guards::{CurrentUser, MaybeUser};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::schemas::review::{ReviewCreate, ReviewListResponse, ReviewResponse};

pub(crate) async fn list_reviews(
    Path(course_id): Path<String>,
    MaybeUser(viewer): MaybeUser,
    State(state): State<AppState>,
) -> Result<Json<ReviewListResponse>, ApiError> {
    let course = fetch_visible_course(&state, &course_id, viewer.as_ref()).await?;

    let reviews = repositories::reviews::list_visible(state.db(), &course.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list reviews"))?;

    Ok(Json(ReviewListResponse::from_reviews(reviews)))
}

/// One review per enrolled learner; posting again replaces the rating and body.
pub(crate) async fn upsert_review(
    Path(course_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<ReviewCreate>,
) -> Result<(StatusCode, Json<ReviewResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let course = fetch_visible_course(&state, &course_id, Some(&user)).await?;

    let enrolled = repositories::progress::is_enrolled(state.db(), &user.id, &course.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check enrollment"))?;
    if !enrolled {
        return Err(ApiError::Forbidden("Enroll in the course before reviewing it"));
    }

    let body = payload.body.as_deref().map(str::trim).filter(|body| !body.is_empty());
    let (review, inserted) = repositories::reviews::upsert(
        state.db(),
        &course.id,
        &user.id,
        payload.rating,
        body,
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to save review"))?;

    let status = if inserted { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(ReviewResponse::from_db(review))))
}
