use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::validation::Pagination;

/// Directed follow edge, follower -> followed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FollowEdge {
    pub id: Uuid,
    pub follower_id: Uuid,
    pub followed_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Default)]
pub struct EdgeFilter {
    pub follower_id: Option<Uuid>,
    pub followed_id: Option<Uuid>,
    pub page: Pagination,
}

/// Which denormalized counter an adjustment targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Followers,
    Following,
}

impl Counter {
    pub fn column(self) -> &'static str {
        match self {
            Counter::Followers => "followers_count",
            Counter::Following => "following_count",
        }
    }
}
