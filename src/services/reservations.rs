//! Workshop reservations: capacity, prerequisites and the time-windowed read rule.

use std::collections::HashSet;

use sqlx::PgPool;
use thiserror::Error;
use time::PrimitiveDateTime;

use crate::core::metrics;
use crate::core::state::AppState;
use crate::core::time::{format_primitive, primitive_now_utc};
use crate::db::models::{Reservation, Workshop};
use crate::db::types::ReservationStatus;
use crate::repositories;
use crate::services::mailer::{send_best_effort, MailMessage};

#[derive(Debug, Error)]
pub(crate) enum ReservationError {
    #[error("workshop not found")]
    WorkshopNotFound,
    #[error("no seats left")]
    Full,
    #[error("required lessons not completed")]
    PrerequisitesMissing(Vec<String>),
    #[error("reservation not found")]
    NotReserved,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug)]
pub(crate) enum ReserveOutcome {
    Created(Reservation),
    AlreadyReserved(Reservation),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Decision {
    AlreadyReserved,
    Full,
    MissingPrerequisites(Vec<String>),
    Proceed,
}

/// Applies the reservation checks in order; the first failing one wins.
///
/// `missing` in the result keeps the order of `required_lessons`.
pub(crate) fn evaluate_reservation(
    current: Option<ReservationStatus>,
    capacity: Option<i32>,
    reserved_count: i64,
    required_lessons: &[String],
    completed_lessons: &HashSet<String>,
) -> Decision {
    if current == Some(ReservationStatus::Reserved) {
        return Decision::AlreadyReserved;
    }
    if let Some(capacity) = capacity {
        if reserved_count >= i64::from(capacity) {
            return Decision::Full;
        }
    }
    let missing: Vec<String> = required_lessons
        .iter()
        .filter(|lesson| !completed_lessons.contains(*lesson))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Decision::MissingPrerequisites(missing);
    }
    Decision::Proceed
}

pub(crate) async fn reserve(
    state: &AppState,
    workshop_id: &str,
    user_id: &str,
) -> Result<ReserveOutcome, ReservationError> {
    let mut tx = state.db().begin().await?;

    // Serialises concurrent reservations of the same workshop.
    let Some(workshop) = repositories::workshops::lock_by_id(&mut *tx, workshop_id).await? else {
        metrics::record_reservation("not_found");
        return Err(ReservationError::WorkshopNotFound);
    };

    let existing = repositories::reservations::find(&mut *tx, workshop_id, user_id).await?;
    let reserved_count = repositories::workshops::count_reserved(&mut *tx, workshop_id).await?;
    let required = repositories::workshops::required_lesson_ids(&mut *tx, workshop_id).await?;
    let completed: HashSet<String> = if required.is_empty() {
        HashSet::new()
    } else {
        repositories::progress::completed_lesson_ids(&mut *tx, user_id, &required)
            .await?
            .into_iter()
            .collect()
    };

    let decision = evaluate_reservation(
        existing.as_ref().map(|row| row.status),
        workshop.capacity,
        reserved_count,
        &required,
        &completed,
    );

    match decision {
        Decision::AlreadyReserved => {
            metrics::record_reservation("idempotent");
            let Some(existing) = existing else {
                return Err(ReservationError::NotReserved);
            };
            return Ok(ReserveOutcome::AlreadyReserved(existing));
        }
        Decision::Full => {
            metrics::record_reservation("full");
            tracing::info!(workshop_id = %workshop_id, user_id = %user_id, "Workshop is full");
            return Err(ReservationError::Full);
        }
        Decision::MissingPrerequisites(missing) => {
            metrics::record_reservation("prerequisites");
            let titles = repositories::lessons::find_titles(&mut *tx, &missing)
                .await?
                .into_iter()
                .map(|(_, title)| title)
                .collect();
            return Err(ReservationError::PrerequisitesMissing(titles));
        }
        Decision::Proceed => {}
    }

    let reservation =
        repositories::reservations::upsert_reserved(&mut *tx, workshop_id, user_id, primitive_now_utc())
            .await?;
    tx.commit().await?;

    metrics::record_reservation("created");
    tracing::info!(
        workshop_id = %workshop_id,
        user_id = %user_id,
        reservation_id = %reservation.id,
        "Workshop reserved"
    );

    send_confirmation(state, &workshop, user_id).await;

    Ok(ReserveOutcome::Created(reservation))
}

pub(crate) async fn cancel(
    pool: &PgPool,
    workshop_id: &str,
    user_id: &str,
) -> Result<Reservation, ReservationError> {
    if repositories::workshops::find_by_id(pool, workshop_id).await?.is_none() {
        return Err(ReservationError::WorkshopNotFound);
    }

    let reservation = repositories::reservations::set_status(
        pool,
        workshop_id,
        user_id,
        ReservationStatus::Cancelled,
        primitive_now_utc(),
    )
    .await?
    .ok_or(ReservationError::NotReserved)?;

    tracing::info!(workshop_id = %workshop_id, user_id = %user_id, "Workshop reservation cancelled");
    Ok(reservation)
}

async fn send_confirmation(state: &AppState, workshop: &Workshop, user_id: &str) {
    let user = match repositories::users::find_by_id(state.db(), user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return,
        Err(err) => {
            tracing::warn!(error = %err, user_id = %user_id, "Failed to load user for confirmation");
            return;
        }
    };
    if user.email.trim().is_empty() {
        return;
    }

    let join_url = state.settings().workshops().join_url(&workshop.id);
    let message = MailMessage {
        to: user.email,
        subject: format!("Your seat at {} is reserved", workshop.title),
        text: format!(
            "You are booked for \"{}\" starting {} (UTC).\nJoin: {join_url}",
            workshop.title,
            format_primitive(workshop.start_time),
        ),
    };
    send_best_effort(state.mailer(), message, "reservation_confirmation").await;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Visibility {
    Visible,
    /// Reported as not found.
    Ended,
    /// Reported as forbidden.
    StartedWithoutReservation,
}

/// Read rule for a workshop. `privileged` covers the owning instructor and admins.
pub(crate) fn workshop_visibility(
    now: PrimitiveDateTime,
    start_time: PrimitiveDateTime,
    duration_min: i32,
    privileged: bool,
    reserved: bool,
) -> Visibility {
    if privileged {
        return Visibility::Visible;
    }
    let end_time = start_time + time::Duration::minutes(i64::from(duration_min));
    if now >= end_time {
        return Visibility::Ended;
    }
    if now >= start_time && !reserved {
        return Visibility::StartedWithoutReservation;
    }
    Visibility::Visible
}

/// Per-viewer facts shown next to a workshop.
#[derive(Debug, Clone, Default)]
pub(crate) struct ViewerContext {
    pub(crate) reserved_count: i64,
    pub(crate) is_reserved: bool,
    /// `(id, title)` in display order.
    pub(crate) required_lessons: Vec<(String, String)>,
    pub(crate) missing_lessons: Vec<String>,
}

pub(crate) async fn viewer_context(
    pool: &PgPool,
    workshop_id: &str,
    viewer_id: Option<&str>,
) -> Result<ViewerContext, sqlx::Error> {
    let reserved_count = repositories::workshops::count_reserved(pool, workshop_id).await?;
    let required_ids = repositories::workshops::required_lesson_ids(pool, workshop_id).await?;
    let required_lessons = repositories::lessons::find_titles(pool, &required_ids).await?;

    let (is_reserved, completed) = match viewer_id {
        Some(viewer_id) => {
            let reservation = repositories::reservations::find(pool, workshop_id, viewer_id).await?;
            let completed: HashSet<String> = if required_ids.is_empty() {
                HashSet::new()
            } else {
                repositories::progress::completed_lesson_ids(pool, viewer_id, &required_ids)
                    .await?
                    .into_iter()
                    .collect()
            };
            (
                reservation.is_some_and(|row| row.status == ReservationStatus::Reserved),
                completed,
            )
        }
        None => (false, HashSet::new()),
    };

    let missing_lessons = required_lessons
        .iter()
        .filter(|(id, _)| !completed.contains(id))
        .map(|(_, title)| title.clone())
        .collect();

    Ok(ViewerContext { reserved_count, is_reserved, required_lessons, missing_lessons })
}
