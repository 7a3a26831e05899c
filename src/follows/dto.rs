use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::AppError,
    follows::repo_types::FollowEdge,
    validation::{Pagination, DEFAULT_LIMIT},
};

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFollowRequest {
    pub followed_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowListQuery {
    pub follower_id: Option<Uuid>,
    pub followed_id: Option<Uuid>,
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

impl FollowListQuery {
    pub fn page(&self) -> Result<Pagination, AppError> {
        Pagination::new(self.skip, self.limit)
    }
}

/// Edge plus a presence flag. An absent edge serializes as
/// `{"hasData": false}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowerRelationResponse {
    #[serde(flatten)]
    pub edge: Option<FollowEdge>,
    pub has_data: bool,
}

impl From<Option<FollowEdge>> for FollowerRelationResponse {
    fn from(edge: Option<FollowEdge>) -> Self {
        Self {
            has_data: edge.is_some(),
            edge,
        }
    }
}
