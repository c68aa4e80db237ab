use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::Lesson;

fn default_published() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct LessonCreate {
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) content: String,
    #[serde(default)]
    #[serde(alias = "durationMin")]
    #[validate(range(min = 0, max = 1440, message = "duration_min must be between 0 and 1440"))]
    pub(crate) duration_min: i32,
    #[serde(default = "default_published")]
    pub(crate) published: bool,
    #[serde(default)]
    #[serde(alias = "orderIndex")]
    #[validate(range(min = 0, message = "order_index must be non-negative"))]
    pub(crate) order_index: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct LessonUpdate {
    #[serde(default)]
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub(crate) title: Option<String>,
    #[serde(default)]
    pub(crate) content: Option<String>,
    #[serde(default)]
    #[serde(alias = "durationMin")]
    #[validate(range(min = 0, max = 1440, message = "duration_min must be between 0 and 1440"))]
    pub(crate) duration_min: Option<i32>,
    #[serde(default)]
    pub(crate) published: Option<bool>,
    #[serde(default)]
    #[serde(alias = "orderIndex")]
    #[validate(range(min = 0, message = "order_index must be non-negative"))]
    pub(crate) order_index: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LessonResponse {
    pub(crate) id: String,
    pub(crate) module_id: String,
    pub(crate) course_id: String,
    pub(crate) title: String,
    pub(crate) content: String,
    pub(crate) duration_min: i32,
    pub(crate) published: bool,
    pub(crate) order_index: i32,
    pub(crate) has_quiz: bool,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl LessonResponse {
    pub(crate) fn from_db(lesson: Lesson, has_quiz: bool) -> Self {
        Self {
            id: lesson.id,
            module_id: lesson.module_id,
            course_id: lesson.course_id,
            title: lesson.title,
            content: lesson.content,
            duration_min: lesson.duration_min,
            published: lesson.published,
            order_index: lesson.order_index,
            has_quiz,
            created_at: format_primitive(lesson.created_at),
            updated_at: format_primitive(lesson.updated_at),
        }
    }
}

/// Outline entry used inside course detail; content is fetched per lesson.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LessonSummary {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) duration_min: i32,
    pub(crate) published: bool,
    pub(crate) order_index: i32,
}

impl LessonSummary {
    pub(crate) fn from_db(lesson: &Lesson) -> Self {
        Self {
            id: lesson.id.clone(),
            title: lesson.title.clone(),
            duration_min: lesson.duration_min,
            published: lesson.published,
            order_index: lesson.order_index,
        }
    }
}
