use std::collections::HashSet;

use thiserror::Error;

use crate::core::state::AppState;
use crate::core::time::{format_primitive, primitive_now_utc};
use crate::db::models::Certificate;
use crate::repositories;
use crate::services::mailer::{send_best_effort, MailMessage};

#[derive(Debug, Error)]
pub(crate) enum CertificateError {
    #[error("course not found")]
    CourseNotFound,
    #[error("not enrolled in course")]
    NotEnrolled,
    #[error("{remaining} lessons left to complete")]
    Incomplete { remaining: usize },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Issues a course certificate once every published lesson is complete.
/// Returns the certificate and whether it was issued by this call.
pub(crate) async fn issue(
    state: &AppState,
    user_id: &str,
    course_id: &str,
) -> Result<(Certificate, bool), CertificateError> {
    let mut tx = state.db().begin().await?;

    let course = repositories::courses::find_by_id(&mut *tx, course_id)
        .await?
        .ok_or(CertificateError::CourseNotFound)?;

    if let Some(existing) = repositories::certificates::find(&mut *tx, user_id, course_id).await? {
        return Ok((existing, false));
    }

    if !repositories::progress::is_enrolled(&mut *tx, user_id, course_id).await? {
        return Err(CertificateError::NotEnrolled);
    }

    let lessons = repositories::lessons::list_published_ids_by_course(&mut *tx, course_id).await?;
    let completed: HashSet<String> =
        repositories::progress::completed_lesson_ids(&mut *tx, user_id, &lessons)
            .await?
            .into_iter()
            .collect();
    let remaining = lessons.iter().filter(|lesson| !completed.contains(*lesson)).count();
    if lessons.is_empty() || remaining > 0 {
        return Err(CertificateError::Incomplete { remaining });
    }

    let issued =
        repositories::certificates::issue(&mut *tx, user_id, course_id, primitive_now_utc()).await?;
    let (certificate, created) = match issued {
        Some(certificate) => (certificate, true),
        None => {
            let existing = repositories::certificates::find(&mut *tx, user_id, course_id).await?;
            let existing = existing.ok_or(sqlx::Error::RowNotFound)?;
            (existing, false)
        }
    };
    tx.commit().await?;

    if created {
        tracing::info!(user_id = %user_id, course_id = %course_id, "Certificate issued");
        if let Ok(Some(user)) = repositories::users::find_by_id(state.db(), user_id).await {
            let message = MailMessage {
                to: user.email,
                subject: format!("Your certificate for {}", course.title),
                text: format!(
                    "Congratulations, {}! You completed \"{}\" on {}.",
                    user.full_name,
                    course.title,
                    format_primitive(certificate.issued_at),
                ),
            };
            send_best_effort(state.mailer(), message, "certificate").await;
        }
    }

    Ok((certificate, created))
}
