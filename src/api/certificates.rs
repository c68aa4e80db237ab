use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::api::courses::fetch_visible_course;
use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::schemas::user::{CertificateEnvelope, CertificateResponse};
use crate::services::certificates::{self, CertificateError};

pub(crate) async fn issue_certificate(
    Path(course_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<CertificateEnvelope>), ApiError> {
    let course = fetch_visible_course(&state, &course_id, Some(&user)).await?;

    let (certificate, created) =
        certificates::issue(&state, &user.id, &course.id).await.map_err(|err| match err {
            CertificateError::CourseNotFound => ApiError::NotFound("Course not found".to_string()),
            CertificateError::NotEnrolled => {
                ApiError::BadRequest("Enroll in the course first".to_string())
            }
            CertificateError::Incomplete { remaining: 0 } => {
                ApiError::BadRequest("Course has no published lessons yet".to_string())
            }
            CertificateError::Incomplete { remaining } => ApiError::BadRequest(format!(
                "Course not complete: {remaining} lessons remaining"
            )),
            CertificateError::Database(e) => ApiError::internal(e, "Failed to issue certificate"),
        })?;

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(CertificateEnvelope { certificate: CertificateResponse::from_db(certificate) })))
}
