use std::collections::HashMap;

use serde::Serialize;

pub(crate) mod admin;
pub(crate) mod auth;
pub(crate) mod comment;
pub(crate) mod course;
pub(crate) mod datetime;
pub(crate) mod lesson;
pub(crate) mod progress;
pub(crate) mod quiz;
pub(crate) mod review;
pub(crate) mod user;
pub(crate) mod workshop;

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) service: String,
    pub(crate) status: String,
    pub(crate) components: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RootResponse {
    pub(crate) message: String,
    pub(crate) version: String,
    pub(crate) docs_url: String,
}
