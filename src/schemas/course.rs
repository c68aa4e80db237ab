use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{Course, CourseModule};
use crate::schemas::lesson::LessonSummary;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct CourseCreate {
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub(crate) title: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 120, message = "slug must be 1-120 characters"))]
    pub(crate) slug: Option<String>,
    #[serde(default)]
    #[validate(length(max = 10000, message = "description is too long"))]
    pub(crate) description: Option<String>,
    #[serde(default)]
    pub(crate) published: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct CourseUpdate {
    #[serde(default)]
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub(crate) title: Option<String>,
    #[serde(default)]
    #[validate(length(max = 10000, message = "description is too long"))]
    pub(crate) description: Option<String>,
    #[serde(default)]
    pub(crate) published: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CoverUploadRequest {
    pub(crate) filename: String,
    #[serde(alias = "contentType")]
    pub(crate) content_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CoverUploadResponse {
    pub(crate) upload_url: String,
    pub(crate) key: String,
    pub(crate) expires_in_seconds: u64,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ModuleCreate {
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub(crate) title: String,
    #[serde(default)]
    #[serde(alias = "orderIndex")]
    #[validate(range(min = 0, message = "order_index must be non-negative"))]
    pub(crate) order_index: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CourseResponse {
    pub(crate) id: String,
    pub(crate) slug: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) instructor_id: String,
    pub(crate) published: bool,
    pub(crate) cover_key: Option<String>,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl CourseResponse {
    pub(crate) fn from_db(course: Course) -> Self {
        Self {
            id: course.id,
            slug: course.slug,
            title: course.title,
            description: course.description,
            instructor_id: course.instructor_id,
            published: course.published,
            cover_key: course.cover_key,
            created_at: format_primitive(course.created_at),
            updated_at: format_primitive(course.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ModuleResponse {
    pub(crate) id: String,
    pub(crate) course_id: String,
    pub(crate) title: String,
    pub(crate) order_index: i32,
    pub(crate) lessons: Vec<LessonSummary>,
}

impl ModuleResponse {
    pub(crate) fn from_db(module: CourseModule, lessons: Vec<LessonSummary>) -> Self {
        Self {
            id: module.id,
            course_id: module.course_id,
            title: module.title,
            order_index: module.order_index,
            lessons,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CourseDetailResponse {
    #[serde(flatten)]
    pub(crate) course: CourseResponse,
    pub(crate) modules: Vec<ModuleResponse>,
    pub(crate) locked_modules: Vec<String>,
    pub(crate) is_enrolled: bool,
}

/// Lowercase ASCII words joined by `-`, used when a course is created without a slug.
pub(crate) fn slugify(title: &str) -> String {
    let raw: String = title
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch.to_ascii_lowercase() } else { '-' })
        .collect();
    let slug = raw.split('-').filter(|part| !part.is_empty()).collect::<Vec<_>>().join("-");
    if slug.is_empty() {
        "course".to_string()
    } else {
        slug
    }
}
