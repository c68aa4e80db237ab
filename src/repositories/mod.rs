pub(crate) mod audit_logs;
pub(crate) mod certificates;
pub(crate) mod comments;
pub(crate) mod course_modules;
pub(crate) mod courses;
pub(crate) mod health;
pub(crate) mod lessons;
pub(crate) mod notifications;
pub(crate) mod progress;
pub(crate) mod quizzes;
pub(crate) mod reservations;
pub(crate) mod reviews;
pub(crate) mod users;
pub(crate) mod workshops;
