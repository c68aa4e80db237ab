use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::Progress;

/// Identifiers are optional at the serde level so a missing one is reported as 400, not 422.
#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ProgressUpdate {
    #[serde(default)]
    #[serde(alias = "courseId")]
    pub(crate) course_id: Option<String>,
    #[serde(default)]
    #[serde(alias = "lessonId")]
    pub(crate) lesson_id: Option<String>,
    #[serde(default)]
    pub(crate) completed: bool,
    #[serde(default)]
    #[serde(alias = "timeSpentSec")]
    #[validate(range(min = 0, max = 86400, message = "time_spent_sec must be between 0 and 86400"))]
    pub(crate) time_spent_sec: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProgressResponse {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) course_id: String,
    pub(crate) lesson_id: Option<String>,
    pub(crate) completed: bool,
    pub(crate) percent: i32,
    pub(crate) time_spent_sec: i32,
    pub(crate) updated_at: String,
}

impl ProgressResponse {
    pub(crate) fn from_db(progress: Progress) -> Self {
        Self {
            id: progress.id,
            user_id: progress.user_id,
            course_id: progress.course_id,
            lesson_id: progress.lesson_id,
            completed: progress.completed,
            percent: progress.percent,
            time_spent_sec: progress.time_spent_sec,
            updated_at: format_primitive(progress.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ProgressEnvelope {
    pub(crate) progress: ProgressResponse,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EnrollmentResponse {
    pub(crate) course_id: String,
    pub(crate) enrolled: bool,
    pub(crate) created: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CourseProgressResponse {
    pub(crate) course_id: String,
    pub(crate) enrolled: bool,
    pub(crate) percent: i32,
    pub(crate) completed_lessons: usize,
    pub(crate) total_lessons: usize,
    pub(crate) lessons: Vec<ProgressResponse>,
}

/// Share of published lessons completed, rounded down. An empty course reports 0.
pub(crate) fn course_percent(completed: usize, total: usize) -> i32 {
    if total == 0 {
        return 0;
    }
    ((completed.min(total) * 100) / total) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn course_percent_rounds_down_and_caps() {
        assert_eq!(course_percent(0, 0), 0);
        assert_eq!(course_percent(1, 3), 33);
        assert_eq!(course_percent(3, 3), 100);
        assert_eq!(course_percent(5, 3), 100);
    }

    #[test]
    fn progress_update_accepts_camel_case() {
        let update: ProgressUpdate = serde_json::from_value(serde_json::json!({
            "courseId": "c1", "lessonId": "l1", "completed": true
        }))
        .unwrap();
        assert_eq!(update.course_id.as_deref(), Some("c1"));
        assert_eq!(update.lesson_id.as_deref(), Some("l1"));
        assert!(update.completed);
    }
}
