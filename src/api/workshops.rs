use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{can_manage, require_manager, CurrentInstructor, CurrentUser, MaybeUser};
use crate::core::security::shared_secret_matches;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::{User, Workshop};
use crate::db::types::UserRole;
use crate::repositories;
use crate::schemas::workshop::{
    ReminderSweepResponse, RequiredLesson, ReservationEnvelope, ReservationResponse,
    WorkshopCreate, WorkshopDetail, WorkshopEnvelope, WorkshopListQuery, WorkshopListResponse,
    WorkshopResponse, WorkshopUpdate,
};
use crate::services::calendar;
use crate::services::reminders;
use crate::services::reservations::{
    self, ReservationError, ReserveOutcome, ViewerContext, Visibility,
};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_workshops).post(create_workshop))
        .route("/reminders", post(run_reminders))
        .route(
            "/:workshop_id",
            get(get_workshop).patch(update_workshop).delete(delete_workshop),
        )
        .route("/:workshop_id/reserve", post(reserve_workshop).delete(cancel_reservation))
        .route("/:workshop_id/calendar.ics", get(workshop_calendar))
}

async fn fetch_workshop(state: &AppState, workshop_id: &str) -> Result<Workshop, ApiError> {
    repositories::workshops::find_by_id(state.db(), workshop_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load workshop"))?
        .ok_or_else(|| ApiError::NotFound("Workshop not found".to_string()))
}

/// Applies the time-windowed read rule and returns the viewer's context on success.
async fn load_visible(
    state: &AppState,
    workshop: &Workshop,
    viewer: Option<&User>,
) -> Result<ViewerContext, ApiError> {
    let context = reservations::viewer_context(
        state.db(),
        &workshop.id,
        viewer.map(|user| user.id.as_str()),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to load workshop context"))?;

    let privileged = viewer.is_some_and(|user| can_manage(user, &workshop.instructor_id));
    match reservations::workshop_visibility(
        primitive_now_utc(),
        workshop.start_time,
        workshop.duration_min,
        privileged,
        context.is_reserved,
    ) {
        Visibility::Visible => Ok(context),
        Visibility::Ended => Err(ApiError::NotFound("Workshop not found".to_string())),
        Visibility::StartedWithoutReservation => {
            Err(ApiError::Forbidden("Workshop has already started"))
        }
    }
}

fn detail(workshop: Workshop, context: ViewerContext, viewer: Option<&User>) -> WorkshopDetail {
    let is_instructor = viewer.is_some_and(|user| can_manage(user, &workshop.instructor_id));
    WorkshopDetail {
        workshop: WorkshopResponse::from_db(workshop),
        reserved_count: context.reserved_count,
        is_reserved: context.is_reserved,
        is_instructor,
        missing_lessons: context.missing_lessons,
        required_lessons: context
            .required_lessons
            .into_iter()
            .map(|(id, title)| RequiredLesson { id, title })
            .collect(),
    }
}

/// Deduplicates `ids` keeping first occurrences, then checks they exist and
/// belong to `course_id` when one is given.
async fn check_required_lessons(
    state: &AppState,
    course_id: Option<&str>,
    ids: &[String],
) -> Result<Vec<String>, ApiError> {
    let mut unique: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids.iter().map(|id| id.trim()).filter(|id| !id.is_empty()) {
        if !unique.iter().any(|seen| seen == id) {
            unique.push(id.to_string());
        }
    }
    if unique.is_empty() {
        return Ok(unique);
    }

    let found = match course_id {
        Some(course_id) => repositories::lessons::count_in_course(state.db(), course_id, &unique)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to check required lessons"))?,
        None => repositories::lessons::find_titles(state.db(), &unique)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to check required lessons"))?
            .len() as i64,
    };

    if found != unique.len() as i64 {
        let message = if course_id.is_some() {
            "Required lessons must belong to the workshop's course"
        } else {
            "Required lesson not found"
        };
        return Err(ApiError::BadRequest(message.to_string()));
    }
    Ok(unique)
}

async fn list_workshops(
    Query(params): Query<WorkshopListQuery>,
    MaybeUser(viewer): MaybeUser,
    State(state): State<AppState>,
) -> Result<Json<WorkshopListResponse>, ApiError> {
    let list_viewer = repositories::workshops::ListViewer {
        user_id: viewer.as_ref().map(|user| user.id.as_str()),
        is_admin: viewer.as_ref().is_some_and(|user| user.role == UserRole::Admin),
        include_ended: params.include_ended
            && viewer.as_ref().is_some_and(|user| user.role.can_teach()),
    };

    let workshops = repositories::workshops::list(state.db(), primitive_now_utc(), list_viewer)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list workshops"))?;

    Ok(Json(WorkshopListResponse {
        workshops: workshops.into_iter().map(WorkshopResponse::from_db).collect(),
    }))
}

async fn create_workshop(
    CurrentInstructor(instructor): CurrentInstructor,
    State(state): State<AppState>,
    Json(payload): Json<WorkshopCreate>,
) -> Result<(StatusCode, Json<WorkshopEnvelope>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(ApiError::BadRequest("Workshop title must not be empty".to_string()));
    }

    let course_id = payload.course_id.as_deref().map(str::trim).filter(|id| !id.is_empty());
    if let Some(course_id) = course_id {
        let course = repositories::courses::find_by_id(state.db(), course_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load course"))?
            .ok_or_else(|| ApiError::NotFound("Course not found".to_string()))?;
        require_manager(&instructor, &course.instructor_id)?;
    }
    let required = check_required_lessons(&state, course_id, &payload.required_lesson_ids).await?;

    let mut tx =
        state.db().begin().await.map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let workshop = repositories::workshops::create(
        &mut *tx,
        repositories::workshops::CreateWorkshop {
            id: &Uuid::new_v4().to_string(),
            instructor_id: &instructor.id,
            course_id,
            title,
            description: payload.description.as_deref(),
            location: payload.location.as_deref(),
            start_time: payload.start_time,
            duration_min: payload.duration_min,
            capacity: payload.capacity,
            skill_level: payload.skill_level,
            now: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create workshop"))?;

    if !required.is_empty() {
        repositories::workshops::replace_requirements(&mut tx, &workshop.id, &required)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to store required lessons"))?;
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit workshop"))?;

    tracing::info!(workshop_id = %workshop.id, instructor_id = %instructor.id, "Workshop created");

    let context = reservations::viewer_context(state.db(), &workshop.id, Some(&instructor.id))
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load workshop context"))?;

    Ok((
        StatusCode::CREATED,
        Json(WorkshopEnvelope { workshop: detail(workshop, context, Some(&instructor)) }),
    ))
}

async fn get_workshop(
    Path(workshop_id): Path<String>,
    MaybeUser(viewer): MaybeUser,
    State(state): State<AppState>,
) -> Result<Json<WorkshopEnvelope>, ApiError> {
    let workshop = fetch_workshop(&state, &workshop_id).await?;
    let context = load_visible(&state, &workshop, viewer.as_ref()).await?;

    Ok(Json(WorkshopEnvelope { workshop: detail(workshop, context, viewer.as_ref()) }))
}

async fn update_workshop(
    Path(workshop_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<WorkshopUpdate>,
) -> Result<Json<WorkshopEnvelope>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    if !payload.capacity_is_valid() {
        return Err(ApiError::BadRequest("capacity must be at least 1".to_string()));
    }

    let workshop = fetch_workshop(&state, &workshop_id).await?;
    require_manager(&user, &workshop.instructor_id)?;

    let required = match payload.required_lesson_ids.as_deref() {
        Some(ids) => Some(check_required_lessons(&state, workshop.course_id.as_deref(), ids).await?),
        None => None,
    };

    let mut tx =
        state.db().begin().await.map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let updated = repositories::workshops::update(
        &mut *tx,
        &workshop.id,
        repositories::workshops::UpdateWorkshop {
            title: payload.title.map(|title| title.trim().to_string()),
            description: payload.description,
            location: payload.location,
            start_time: payload.start_time,
            duration_min: payload.duration_min,
            capacity: payload.capacity,
            skill_level: payload.skill_level,
            updated_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update workshop"))?
    .ok_or_else(|| ApiError::NotFound("Workshop not found".to_string()))?;

    if let Some(required) = required {
        repositories::workshops::replace_requirements(&mut tx, &updated.id, &required)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to store required lessons"))?;
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit workshop update"))?;

    let context = reservations::viewer_context(state.db(), &updated.id, Some(&user.id))
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load workshop context"))?;

    Ok(Json(WorkshopEnvelope { workshop: detail(updated, context, Some(&user)) }))
}

async fn delete_workshop(
    Path(workshop_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let workshop = fetch_workshop(&state, &workshop_id).await?;
    require_manager(&user, &workshop.instructor_id)?;

    let mut tx =
        state.db().begin().await.map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;
    let removed = repositories::workshops::delete(&mut tx, &workshop.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete workshop"))?;
    if removed == 0 {
        return Err(ApiError::NotFound("Workshop not found".to_string()));
    }
    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit workshop deletion"))?;

    tracing::info!(workshop_id = %workshop.id, actor_id = %user.id, "Workshop deleted");

    Ok(StatusCode::NO_CONTENT)
}

fn map_reservation_error(err: ReservationError) -> ApiError {
    match err {
        ReservationError::WorkshopNotFound => ApiError::NotFound("Workshop not found".to_string()),
        ReservationError::Full => ApiError::Conflict("No seats left".to_string()),
        ReservationError::PrerequisitesMissing(missing) => ApiError::PrerequisitesMissing(missing),
        ReservationError::NotReserved => ApiError::NotFound("Reservation not found".to_string()),
        ReservationError::Database(err) => ApiError::internal(err, "Failed to update reservation"),
    }
}

async fn reserve_workshop(
    Path(workshop_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<ReservationEnvelope>), ApiError> {
    let outcome =
        reservations::reserve(&state, &workshop_id, &user.id).await.map_err(map_reservation_error)?;

    Ok(match outcome {
        ReserveOutcome::Created(reservation) => (
            StatusCode::CREATED,
            Json(ReservationEnvelope {
                ok: None,
                reservation: ReservationResponse::from_db(reservation),
            }),
        ),
        ReserveOutcome::AlreadyReserved(reservation) => (
            StatusCode::OK,
            Json(ReservationEnvelope {
                ok: Some(true),
                reservation: ReservationResponse::from_db(reservation),
            }),
        ),
    })
}

async fn cancel_reservation(
    Path(workshop_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ReservationEnvelope>, ApiError> {
    let reservation = reservations::cancel(state.db(), &workshop_id, &user.id)
        .await
        .map_err(map_reservation_error)?;

    Ok(Json(ReservationEnvelope {
        ok: Some(true),
        reservation: ReservationResponse::from_db(reservation),
    }))
}

async fn workshop_calendar(
    Path(workshop_id): Path<String>,
    MaybeUser(viewer): MaybeUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let workshop = fetch_workshop(&state, &workshop_id).await?;
    load_visible(&state, &workshop, viewer.as_ref()).await?;

    let settings = state.settings().workshops();
    let body = calendar::workshop_event(
        &workshop,
        &settings.join_url(&workshop.id),
        settings.calendar_host(),
        primitive_now_utc(),
    )
    .map_err(|e| ApiError::internal(e, "Failed to render calendar"))?;
    let disposition = format!("attachment; filename=\"{}\"", calendar::file_name(&workshop));

    Ok((
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

async fn run_reminders(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<ReminderSweepResponse>, ApiError> {
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .unwrap_or_default();

    if !shared_secret_matches(presented.trim(), &state.settings().workshops().cron_secret) {
        return Err(ApiError::Unauthorized("Invalid cron secret"));
    }

    let report = reminders::run_sweep(&state, primitive_now_utc())
        .await
        .map_err(|e| ApiError::internal(e, "Reminder sweep failed"))?;

    tracing::info!(sent = report.sent(), failed = report.failed(), "Reminder sweep finished");

    Ok(Json(ReminderSweepResponse { ok: true, report }))
}

#[cfg(test)]
mod tests;
