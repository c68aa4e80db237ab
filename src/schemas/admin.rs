use serde::{Deserialize, Serialize};

use crate::core::time::format_primitive;
use crate::db::models::AuditLog;
use crate::db::types::UserRole;

#[derive(Debug, Deserialize)]
pub(crate) struct UserListQuery {
    #[serde(default)]
    pub(crate) skip: i64,
    #[serde(default = "crate::api::pagination::default_limit")]
    pub(crate) limit: i64,
    #[serde(default)]
    pub(crate) role: Option<UserRole>,
    #[serde(default)]
    #[serde(alias = "isActive")]
    pub(crate) is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AdminUserUpdate {
    #[serde(default)]
    pub(crate) role: Option<UserRole>,
    #[serde(default)]
    #[serde(alias = "isActive")]
    pub(crate) is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PublishUpdate {
    pub(crate) published: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VisibilityUpdate {
    pub(crate) hidden: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AuditLogResponse {
    pub(crate) id: String,
    pub(crate) actor_id: Option<String>,
    pub(crate) action: String,
    pub(crate) target_type: String,
    pub(crate) target_id: String,
    pub(crate) details: serde_json::Value,
    pub(crate) created_at: String,
}

impl AuditLogResponse {
    pub(crate) fn from_db(entry: AuditLog) -> Self {
        Self {
            id: entry.id,
            actor_id: entry.actor_id,
            action: entry.action,
            target_type: entry.target_type,
            target_id: entry.target_id,
            details: entry.details.0,
            created_at: format_primitive(entry.created_at),
        }
    }
}
