use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "userrole", rename_all = "lowercase")]
pub(crate) enum UserRole {
    Student,
    Instructor,
    Admin,
}

impl UserRole {
    pub(crate) fn can_teach(self) -> bool {
        matches!(self, Self::Instructor | Self::Admin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "reservationstatus", rename_all = "lowercase")]
pub(crate) enum ReservationStatus {
    Reserved,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "skilllevel", rename_all = "lowercase")]
pub(crate) enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
}
