use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::api::courses::{fetch_course, fetch_visible_course};
use crate::api::errors::ApiError;
use crate::api::guards::{can_manage, require_manager, CurrentUser};
use crate::api::{comments, quizzes};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::{Course, Lesson, User};
use crate::repositories;
use crate::schemas::lesson::{LessonCreate, LessonResponse, LessonUpdate};

pub(crate) fn modules_router() -> Router<AppState> {
    Router::new().route("/:module_id/lessons", post(create_lesson))
}

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/:lesson_id", get(get_lesson).patch(update_lesson))
        .route("/:lesson_id/quiz", get(quizzes::get_quiz).put(quizzes::replace_quiz))
        .route("/:lesson_id/quiz/submissions", post(quizzes::submit_quiz))
        .route("/:lesson_id/comments", get(comments::list_comments).post(comments::create_comment))
}

pub(crate) struct LessonAccess {
    pub(crate) lesson: Lesson,
    pub(crate) course: Course,
    /// Course owner or admin.
    pub(crate) manager: bool,
}

/// Loads a lesson through its course's visibility. Unpublished lessons are only
/// visible to managers; everyone else gets 404.
pub(crate) async fn load_lesson(
    state: &AppState,
    lesson_id: &str,
    user: &User,
) -> Result<LessonAccess, ApiError> {
    let lesson = repositories::lessons::find_by_id(state.db(), lesson_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load lesson"))?
        .ok_or_else(|| ApiError::NotFound("Lesson not found".to_string()))?;

    let course = fetch_visible_course(state, &lesson.course_id, Some(user)).await?;
    let manager = can_manage(user, &course.instructor_id);
    if !lesson.published && !manager {
        return Err(ApiError::NotFound("Lesson not found".to_string()));
    }

    Ok(LessonAccess { lesson, course, manager })
}

async fn has_quiz(state: &AppState, lesson_id: &str) -> Result<bool, ApiError> {
    repositories::quizzes::find_by_lesson(state.db(), lesson_id)
        .await
        .map(|quiz| quiz.is_some())
        .map_err(|e| ApiError::internal(e, "Failed to load quiz"))
}

async fn create_lesson(
    Path(module_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<LessonCreate>,
) -> Result<(StatusCode, Json<LessonResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let module = repositories::course_modules::find_by_id(state.db(), &module_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load module"))?
        .ok_or_else(|| ApiError::NotFound("Module not found".to_string()))?;
    let course = fetch_course(&state, &module.course_id).await?;
    require_manager(&user, &course.instructor_id)?;

    let lesson = repositories::lessons::create(
        state.db(),
        repositories::lessons::CreateLesson {
            id: &Uuid::new_v4().to_string(),
            module_id: &module.id,
            course_id: &course.id,
            title: payload.title.trim(),
            content: &payload.content,
            duration_min: payload.duration_min,
            published: payload.published,
            order_index: payload.order_index,
            now: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create lesson"))?;

    tracing::info!(lesson_id = %lesson.id, course_id = %course.id, "Lesson created");

    Ok((StatusCode::CREATED, Json(LessonResponse::from_db(lesson, false))))
}

async fn get_lesson(
    Path(lesson_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<LessonResponse>, ApiError> {
    let access = load_lesson(&state, &lesson_id, &user).await?;
    let has_quiz = has_quiz(&state, &access.lesson.id).await?;
    Ok(Json(LessonResponse::from_db(access.lesson, has_quiz)))
}

async fn update_lesson(
    Path(lesson_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<LessonUpdate>,
) -> Result<Json<LessonResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let access = load_lesson(&state, &lesson_id, &user).await?;
    if !access.manager {
        return Err(ApiError::Forbidden("Not enough permissions"));
    }

    let updated = repositories::lessons::update(
        state.db(),
        &access.lesson.id,
        repositories::lessons::UpdateLesson {
            title: payload.title.map(|title| title.trim().to_string()),
            content: payload.content,
            duration_min: payload.duration_min,
            published: payload.published,
            order_index: payload.order_index,
            updated_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update lesson"))?
    .ok_or_else(|| ApiError::NotFound("Lesson not found".to_string()))?;

    let has_quiz = has_quiz(&state, &updated.id).await?;
    tracing::info!(lesson_id = %updated.id, course_id = %access.course.id, "Lesson updated");

    Ok(Json(LessonResponse::from_db(updated, has_quiz)))
}
