use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{Reservation, Workshop};
use crate::db::types::{ReservationStatus, SkillLevel};
use crate::schemas::datetime::{
    deserialize_flexible, deserialize_nullable, deserialize_option_flexible,
};
use crate::services::reminders::SweepReport;

fn default_skill_level() -> SkillLevel {
    SkillLevel::Beginner
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct WorkshopCreate {
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub(crate) title: String,
    #[serde(default)]
    #[validate(length(max = 10000, message = "description is too long"))]
    pub(crate) description: Option<String>,
    #[serde(default)]
    #[validate(length(max = 500, message = "location is too long"))]
    pub(crate) location: Option<String>,
    #[serde(alias = "startTime", deserialize_with = "deserialize_flexible")]
    pub(crate) start_time: PrimitiveDateTime,
    #[serde(alias = "durationMin")]
    #[validate(range(min = 1, max = 1440, message = "duration_min must be between 1 and 1440"))]
    pub(crate) duration_min: i32,
    #[serde(default)]
    #[validate(range(min = 1, message = "capacity must be at least 1"))]
    pub(crate) capacity: Option<i32>,
    #[serde(default = "default_skill_level")]
    #[serde(alias = "skillLevel")]
    pub(crate) skill_level: SkillLevel,
    #[serde(default)]
    #[serde(alias = "courseId")]
    pub(crate) course_id: Option<String>,
    #[serde(default)]
    #[serde(alias = "requiredLessonIds")]
    pub(crate) required_lesson_ids: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct WorkshopUpdate {
    #[serde(default)]
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub(crate) title: Option<String>,
    #[serde(default)]
    #[validate(length(max = 10000, message = "description is too long"))]
    pub(crate) description: Option<String>,
    #[serde(default)]
    #[validate(length(max = 500, message = "location is too long"))]
    pub(crate) location: Option<String>,
    #[serde(default)]
    #[serde(alias = "startTime", deserialize_with = "deserialize_option_flexible")]
    pub(crate) start_time: Option<PrimitiveDateTime>,
    #[serde(default)]
    #[serde(alias = "durationMin")]
    #[validate(range(min = 1, max = 1440, message = "duration_min must be between 1 and 1440"))]
    pub(crate) duration_min: Option<i32>,
    /// `null` lifts the limit; an absent field keeps it.
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub(crate) capacity: Option<Option<i32>>,
    #[serde(default)]
    #[serde(alias = "skillLevel")]
    pub(crate) skill_level: Option<SkillLevel>,
    #[serde(default)]
    #[serde(alias = "requiredLessonIds")]
    pub(crate) required_lesson_ids: Option<Vec<String>>,
}

impl WorkshopUpdate {
    pub(crate) fn capacity_is_valid(&self) -> bool {
        !matches!(self.capacity, Some(Some(value)) if value < 1)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WorkshopListQuery {
    #[serde(default)]
    #[serde(alias = "includeEnded")]
    pub(crate) include_ended: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WorkshopResponse {
    pub(crate) id: String,
    pub(crate) instructor_id: String,
    pub(crate) course_id: Option<String>,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) location: Option<String>,
    pub(crate) start_time: String,
    pub(crate) end_time: String,
    pub(crate) duration_min: i32,
    pub(crate) capacity: Option<i32>,
    pub(crate) skill_level: SkillLevel,
    pub(crate) created_at: String,
}

impl WorkshopResponse {
    pub(crate) fn from_db(workshop: Workshop) -> Self {
        let end_time = format_primitive(workshop.end_time());
        Self {
            id: workshop.id,
            instructor_id: workshop.instructor_id,
            course_id: workshop.course_id,
            title: workshop.title,
            description: workshop.description,
            location: workshop.location,
            start_time: format_primitive(workshop.start_time),
            end_time,
            duration_min: workshop.duration_min,
            capacity: workshop.capacity,
            skill_level: workshop.skill_level,
            created_at: format_primitive(workshop.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct RequiredLesson {
    pub(crate) id: String,
    pub(crate) title: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WorkshopDetail {
    #[serde(flatten)]
    pub(crate) workshop: WorkshopResponse,
    pub(crate) reserved_count: i64,
    pub(crate) is_reserved: bool,
    pub(crate) is_instructor: bool,
    pub(crate) missing_lessons: Vec<String>,
    pub(crate) required_lessons: Vec<RequiredLesson>,
}

#[derive(Debug, Serialize)]
pub(crate) struct WorkshopEnvelope {
    pub(crate) workshop: WorkshopDetail,
}

#[derive(Debug, Serialize)]
pub(crate) struct WorkshopListResponse {
    pub(crate) workshops: Vec<WorkshopResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReservationResponse {
    pub(crate) id: String,
    pub(crate) workshop_id: String,
    pub(crate) user_id: String,
    pub(crate) status: ReservationStatus,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl ReservationResponse {
    pub(crate) fn from_db(reservation: Reservation) -> Self {
        Self {
            id: reservation.id,
            workshop_id: reservation.workshop_id,
            user_id: reservation.user_id,
            status: reservation.status,
            created_at: format_primitive(reservation.created_at),
            updated_at: format_primitive(reservation.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ReservationEnvelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) ok: Option<bool>,
    pub(crate) reservation: ReservationResponse,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReminderSweepResponse {
    pub(crate) ok: bool,
    #[serde(flatten)]
    pub(crate) report: SweepReport,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn create_accepts_datetime_local_start() {
        let payload: WorkshopCreate = serde_json::from_value(json!({
            "title": "Sourdough Basics",
            "startTime": "2025-09-01T18:00",
            "durationMin": 120,
            "capacity": 8
        }))
        .unwrap();

        assert_eq!(payload.start_time, datetime!(2025-09-01 18:00));
        assert_eq!(payload.skill_level, SkillLevel::Beginner);
        assert!(payload.required_lesson_ids.is_empty());
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn update_distinguishes_null_capacity_from_absent() {
        let cleared: WorkshopUpdate = serde_json::from_value(json!({"capacity": null})).unwrap();
        assert_eq!(cleared.capacity, Some(None));

        let untouched: WorkshopUpdate = serde_json::from_value(json!({"title": "New"})).unwrap();
        assert_eq!(untouched.capacity, None);

        let invalid: WorkshopUpdate = serde_json::from_value(json!({"capacity": 0})).unwrap();
        assert!(!invalid.capacity_is_valid());
    }

    #[test]
    fn reservation_status_serializes_uppercase() {
        let value = serde_json::to_value(ReservationStatus::Cancelled).unwrap();
        assert_eq!(value, json!("CANCELLED"));
    }
}
