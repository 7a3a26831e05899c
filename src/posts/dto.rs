use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::AppError,
    validation::{Pagination, DEFAULT_LIMIT},
};

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

#[derive(Debug, Deserialize)]
pub struct PostBody {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostListQuery {
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Debug, Deserialize)]
pub struct FeedParams {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

impl PostListQuery {
    pub fn page(&self) -> Result<Pagination, AppError> {
        Pagination::new(self.skip, self.limit)
    }
}

impl FeedParams {
    pub fn page(&self) -> Result<Pagination, AppError> {
        Pagination::new(self.skip, self.limit)
    }
}
