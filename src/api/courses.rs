use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{can_manage, require_manager, CurrentInstructor, CurrentUser, MaybeUser};
use crate::api::pagination::{PageQuery, PaginatedResponse};
use crate::api::validation::validate_image_upload;
use crate::api::{certificates, progress, reviews};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::{Course, User};
use crate::repositories;
use crate::schemas::course::{
    slugify, CourseCreate, CourseDetailResponse, CourseResponse, CourseUpdate,
    CoverUploadRequest, CoverUploadResponse, ModuleCreate, ModuleResponse,
};
use crate::schemas::lesson::LessonSummary;
use crate::services::{deletion, progress_gate, storage};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_courses).post(create_course))
        .route("/:course_id", get(get_course).patch(update_course).delete(delete_course))
        .route("/:course_id/cover-upload-url", post(cover_upload_url))
        .route("/:course_id/modules", post(create_module))
        .route("/:course_id/enroll", post(progress::enroll))
        .route("/:course_id/progress", get(progress::course_progress))
        .route("/:course_id/reviews", get(reviews::list_reviews).post(reviews::upsert_review))
        .route("/:course_id/certificate", post(certificates::issue_certificate))
}

pub(crate) async fn fetch_course(state: &AppState, course_id: &str) -> Result<Course, ApiError> {
    repositories::courses::find_by_id(state.db(), course_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load course"))?
        .ok_or_else(|| ApiError::NotFound("Course not found".to_string()))
}

/// Loads a course the viewer may see. Unpublished courses are hidden from everyone but
/// the owner and admins.
pub(crate) async fn fetch_visible_course(
    state: &AppState,
    course_id: &str,
    viewer: Option<&User>,
) -> Result<Course, ApiError> {
    let course = fetch_course(state, course_id).await?;
    let manager = viewer.is_some_and(|user| can_manage(user, &course.instructor_id));
    if !course.published && !manager {
        return Err(ApiError::NotFound("Course not found".to_string()));
    }
    Ok(course)
}

async fn list_courses(
    Query(params): Query<PageQuery>,
    State(state): State<AppState>,
) -> Result<Json<PaginatedResponse<CourseResponse>>, ApiError> {
    let (skip, limit) = params.normalized();

    let courses = repositories::courses::list_published(state.db(), skip, limit)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list courses"))?;
    let total_count = repositories::courses::count_published(state.db())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count courses"))?;

    Ok(Json(PaginatedResponse {
        items: courses.into_iter().map(CourseResponse::from_db).collect(),
        total_count,
        skip,
        limit,
    }))
}

async fn create_course(
    CurrentInstructor(instructor): CurrentInstructor,
    State(state): State<AppState>,
    Json(payload): Json<CourseCreate>,
) -> Result<(StatusCode, Json<CourseResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(ApiError::BadRequest("Course title must not be empty".to_string()));
    }

    let slug = match payload.slug.as_deref().map(str::trim) {
        Some(explicit) if !explicit.is_empty() => slugify(explicit),
        _ => {
            let base = slugify(title);
            let taken = repositories::courses::slug_exists(state.db(), &base)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to check course slug"))?;
            if taken {
                format!("{base}-{}", &Uuid::new_v4().simple().to_string()[..6])
            } else {
                base
            }
        }
    };

    let course = repositories::courses::create(
        state.db(),
        repositories::courses::CreateCourse {
            id: &Uuid::new_v4().to_string(),
            slug: &slug,
            title,
            description: payload.description.as_deref(),
            instructor_id: &instructor.id,
            published: payload.published,
            now: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| {
        if crate::db::is_unique_violation(&e) {
            ApiError::Conflict(format!("Course slug '{slug}' is already taken"))
        } else {
            ApiError::internal(e, "Failed to create course")
        }
    })?;

    tracing::info!(course_id = %course.id, instructor_id = %instructor.id, "Course created");

    Ok((StatusCode::CREATED, Json(CourseResponse::from_db(course))))
}

async fn get_course(
    Path(course_id): Path<String>,
    MaybeUser(viewer): MaybeUser,
    State(state): State<AppState>,
) -> Result<Json<CourseDetailResponse>, ApiError> {
    let course = fetch_visible_course(&state, &course_id, viewer.as_ref()).await?;
    let manager = viewer.as_ref().is_some_and(|user| can_manage(user, &course.instructor_id));

    let modules = repositories::course_modules::list_by_course(state.db(), &course.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list modules"))?;
    let lessons = repositories::lessons::list_by_course(state.db(), &course.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list lessons"))?;

    let mut lessons_by_module: HashMap<String, Vec<LessonSummary>> = HashMap::new();
    for lesson in lessons.iter().filter(|lesson| manager || lesson.published) {
        lessons_by_module
            .entry(lesson.module_id.clone())
            .or_default()
            .push(LessonSummary::from_db(lesson));
    }

    // Anonymous viewers have no submissions, so every quiz counts as unpassed.
    let viewer_id = viewer.as_ref().map(|user| user.id.as_str()).unwrap_or_default();
    let locked_modules = progress_gate::locked_modules(
        state.db(),
        &course.id,
        viewer_id,
        state.settings().progress().quiz_pass_policy,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to compute locked modules"))?;

    let is_enrolled = match viewer.as_ref() {
        Some(user) => repositories::progress::is_enrolled(state.db(), &user.id, &course.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to check enrollment"))?,
        None => false,
    };

    let modules = modules
        .into_iter()
        .map(|module| {
            let lessons = lessons_by_module.remove(&module.id).unwrap_or_default();
            ModuleResponse::from_db(module, lessons)
        })
        .collect();

    Ok(Json(CourseDetailResponse {
        course: CourseResponse::from_db(course),
        modules,
        locked_modules,
        is_enrolled,
    }))
}

async fn update_course(
    Path(course_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<CourseUpdate>,
) -> Result<Json<CourseResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let course = fetch_course(&state, &course_id).await?;
    require_manager(&user, &course.instructor_id)?;

    let updated = repositories::courses::update(
        state.db(),
        &course.id,
        repositories::courses::UpdateCourse {
            title: payload.title.map(|title| title.trim().to_string()),
            description: payload.description,
            published: payload.published,
            cover_key: None,
            updated_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update course"))?
    .ok_or_else(|| ApiError::NotFound("Course not found".to_string()))?;

    Ok(Json(CourseResponse::from_db(updated)))
}

async fn delete_course(
    Path(course_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let course = fetch_course(&state, &course_id).await?;
    require_manager(&user, &course.instructor_id)?;

    let mut tx =
        state.db().begin().await.map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    deletion::delete_course(&mut tx, &course.id).await.map_err(|err| match err {
        deletion::DeletionError::NotFound => ApiError::NotFound("Course not found".to_string()),
        other => ApiError::internal(other, "Failed to delete course"),
    })?;

    repositories::audit_logs::insert(
        &mut *tx,
        repositories::audit_logs::NewAuditLog {
            actor_id: &user.id,
            action: "course.delete",
            target_type: "course",
            target_id: &course.id,
            details: serde_json::json!({ "slug": course.slug, "title": course.title }),
            now: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to write audit log"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit course deletion"))?;

    tracing::info!(course_id = %course.id, actor_id = %user.id, "Course deleted");

    Ok(StatusCode::NO_CONTENT)
}

async fn cover_upload_url(
    Path(course_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<CoverUploadRequest>,
) -> Result<Json<CoverUploadResponse>, ApiError> {
    let course = fetch_course(&state, &course_id).await?;
    require_manager(&user, &course.instructor_id)?;

    let extension = validate_image_upload(
        &payload.filename,
        &payload.content_type,
        &state.settings().s3().allowed_image_extensions,
    )?;

    let storage = state
        .storage()
        .ok_or_else(|| ApiError::ServiceUnavailable("Object storage is not configured".to_string()))?;

    let key = storage::cover_object_key(&course.id, &extension);
    let expires_in_seconds = state.settings().s3().presigned_url_expire_minutes * 60;
    let upload_url = storage
        .presign_put(
            &key,
            storage::image_content_type(&extension),
            std::time::Duration::from_secs(expires_in_seconds),
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to presign cover upload"))?;

    repositories::courses::update(
        state.db(),
        &course.id,
        repositories::courses::UpdateCourse {
            title: None,
            description: None,
            published: None,
            cover_key: Some(key.clone()),
            updated_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to store cover key"))?;

    Ok(Json(CoverUploadResponse { upload_url, key, expires_in_seconds }))
}

async fn create_module(
    Path(course_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<ModuleCreate>,
) -> Result<(StatusCode, Json<ModuleResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let course = fetch_course(&state, &course_id).await?;
    require_manager(&user, &course.instructor_id)?;

    let module = repositories::course_modules::create(
        state.db(),
        &Uuid::new_v4().to_string(),
        &course.id,
        payload.title.trim(),
        payload.order_index,
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create module"))?;

    Ok((StatusCode::CREATED, Json(ModuleResponse::from_db(module, Vec::new()))))
}
