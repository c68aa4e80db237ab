use std::collections::HashSet;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use validator::Validate;

use crate::api::courses::fetch_visible_course;
use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::schemas::progress::{
    course_percent, CourseProgressResponse, EnrollmentResponse, ProgressEnvelope,
    ProgressResponse, ProgressUpdate,
};
use crate::services::progress_gate::{self, GateError};

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/", post(update_progress))
}

pub(crate) fn map_gate_error(err: GateError) -> ApiError {
    match err {
        GateError::LessonNotFound => ApiError::NotFound("Lesson not found".to_string()),
        GateError::LessonNotInCourse => {
            ApiError::BadRequest("Lesson does not belong to this course".to_string())
        }
        GateError::QuizNotPassed => {
            ApiError::BadRequest("Pass the lesson quiz before completing it".to_string())
        }
        GateError::Database(e) => ApiError::internal(e, "Failed to update progress"),
    }
}

async fn update_progress(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<ProgressUpdate>,
) -> Result<Json<ProgressEnvelope>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let course_id = required_id(payload.course_id.as_deref(), "courseId")?;
    let lesson_id = required_id(payload.lesson_id.as_deref(), "lessonId")?;

    fetch_visible_course(&state, course_id, Some(&user)).await?;

    let progress = progress_gate::set_completion(
        state.db(),
        &user.id,
        course_id,
        lesson_id,
        payload.completed,
        payload.time_spent_sec,
        state.settings().progress().quiz_pass_policy,
    )
    .await
    .map_err(map_gate_error)?;

    Ok(Json(ProgressEnvelope { progress: ProgressResponse::from_db(progress) }))
}

fn required_id<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, ApiError> {
    match value.map(str::trim) {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(ApiError::BadRequest(format!("Missing {field}"))),
    }
}

pub(crate) async fn enroll(
    Path(course_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<EnrollmentResponse>), ApiError> {
    let course = fetch_visible_course(&state, &course_id, Some(&user)).await?;

    let created =
        repositories::progress::ensure_enrollment(state.db(), &user.id, &course.id, primitive_now_utc())
            .await
            .map_err(|e| ApiError::internal(e, "Failed to enroll"))?;

    if created {
        tracing::info!(user_id = %user.id, course_id = %course.id, "User enrolled in course");
    }

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(EnrollmentResponse { course_id: course.id, enrolled: true, created })))
}

pub(crate) async fn course_progress(
    Path(course_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<CourseProgressResponse>, ApiError> {
    let course = fetch_visible_course(&state, &course_id, Some(&user)).await?;

    let enrolled = repositories::progress::is_enrolled(state.db(), &user.id, &course.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check enrollment"))?;
    let published: HashSet<String> =
        repositories::lessons::list_published_ids_by_course(state.db(), &course.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list lessons"))?
            .into_iter()
            .collect();
    let rows = repositories::progress::list_for_course(state.db(), &user.id, &course.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load progress"))?;

    let completed_lessons = rows
        .iter()
        .filter(|row| row.completed)
        .filter(|row| row.lesson_id.as_ref().is_some_and(|id| published.contains(id)))
        .count();

    Ok(Json(CourseProgressResponse {
        course_id: course.id,
        enrolled,
        percent: course_percent(completed_lessons, published.len()),
        completed_lessons,
        total_lessons: published.len(),
        lessons: rows.into_iter().map(ProgressResponse::from_db).collect(),
    }))
}
