use serde::Deserialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    error::AppError,
    validation::{Pagination, DEFAULT_LIMIT},
};

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub biography: Option<String>,
    pub location: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub birthdate: Option<OffsetDateTime>,
    pub gender: Option<String>,
    pub avatar_url: Option<String>,
    pub cover_url: Option<String>,
    pub is_active: Option<bool>,
    pub is_superuser: Option<bool>,
}

/// Absent fields are left unchanged. Email and counters are not patchable.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub biography: Option<String>,
    pub location: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub birthdate: Option<OffsetDateTime>,
    pub gender: Option<String>,
    pub avatar_url: Option<String>,
    pub cover_url: Option<String>,
    pub password: Option<String>,
    pub is_active: Option<bool>,
    pub is_superuser: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListQuery {
    pub follower_id: Option<Uuid>,
    pub followed_id: Option<Uuid>,
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

impl UserListQuery {
    pub fn page(&self) -> Result<Pagination, AppError> {
        Pagination::new(self.skip, self.limit)
    }
}
