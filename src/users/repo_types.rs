use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::validation::Pagination;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub full_name: String,
    pub biography: String,
    pub location: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub birthdate: Option<OffsetDateTime>,
    pub gender: String,
    pub avatar_url: String,
    pub cover_url: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub is_active: bool,
    pub is_superuser: bool,
    pub followers_count: i64, // written only by the follows repo
    pub following_count: i64, // written only by the follows repo
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Columns supplied at registration. Counters always start at zero.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub full_name: String,
    pub biography: String,
    pub location: String,
    pub birthdate: Option<OffsetDateTime>,
    pub gender: String,
    pub avatar_url: String,
    pub cover_url: String,
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub is_superuser: bool,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub full_name: Option<String>,
    pub biography: Option<String>,
    pub location: Option<String>,
    pub birthdate: Option<OffsetDateTime>,
    pub gender: Option<String>,
    pub avatar_url: Option<String>,
    pub cover_url: Option<String>,
    pub password_hash: Option<String>,
    pub is_active: Option<bool>,
    pub is_superuser: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// Keep users followed by this user.
    pub follower_id: Option<Uuid>,
    /// Keep users that follow this user.
    pub followed_id: Option<Uuid>,
    /// Case-insensitive substring of the full name.
    pub search: String,
    pub page: Pagination,
}
