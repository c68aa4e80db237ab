use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::Review;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ReviewCreate {
    #[validate(range(min = 1, max = 5, message = "rating must be between 1 and 5"))]
    pub(crate) rating: i32,
    #[serde(default)]
    #[validate(length(max = 5000, message = "body is too long"))]
    pub(crate) body: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReviewResponse {
    pub(crate) id: String,
    pub(crate) course_id: String,
    pub(crate) user_id: String,
    pub(crate) rating: i32,
    pub(crate) body: Option<String>,
    pub(crate) hidden: bool,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl ReviewResponse {
    pub(crate) fn from_db(review: Review) -> Self {
        Self {
            id: review.id,
            course_id: review.course_id,
            user_id: review.user_id,
            rating: review.rating,
            body: review.body,
            hidden: review.hidden,
            created_at: format_primitive(review.created_at),
            updated_at: format_primitive(review.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReviewListResponse {
    pub(crate) items: Vec<ReviewResponse>,
    pub(crate) count: usize,
    pub(crate) average_rating: Option<f64>,
}

impl ReviewListResponse {
    pub(crate) fn from_reviews(reviews: Vec<Review>) -> Self {
        let count = reviews.len();
        let average_rating = (count > 0).then(|| {
            let total: i64 = reviews.iter().map(|review| i64::from(review.rating)).sum();
            (total as f64 / count as f64 * 10.0).round() / 10.0
        });
        Self {
            items: reviews.into_iter().map(ReviewResponse::from_db).collect(),
            count,
            average_rating,
        }
    }
}
