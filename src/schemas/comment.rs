use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::Comment;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct CommentCreate {
    #[validate(length(min = 1, max = 5000, message = "body must be 1-5000 characters"))]
    pub(crate) body: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CommentResponse {
    pub(crate) id: String,
    pub(crate) lesson_id: String,
    pub(crate) user_id: String,
    pub(crate) body: String,
    pub(crate) hidden: bool,
    pub(crate) created_at: String,
}

impl CommentResponse {
    pub(crate) fn from_db(comment: Comment) -> Self {
        Self {
            id: comment.id,
            lesson_id: comment.lesson_id,
            user_id: comment.user_id,
            body: comment.body,
            hidden: comment.hidden,
            created_at: format_primitive(comment.created_at),
        }
    }
}
