use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::validation::Pagination;

/// Flat row produced by the posts-users join.
#[derive(Debug, Clone, FromRow)]
pub struct PostRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub author_full_name: String,
    pub author_avatar_url: String,
}

/// Author display data embedded in every post. Never carries credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostAuthor {
    pub id: Uuid,
    pub full_name: String,
    pub avatar_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub user: PostAuthor,
}

impl From<PostRow> for PostView {
    fn from(r: PostRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            content: r.content,
            created_at: r.created_at,
            updated_at: r.updated_at,
            user: PostAuthor {
                id: r.user_id,
                full_name: r.author_full_name,
                avatar_url: r.author_avatar_url,
            },
        }
    }
}

/// Non-personalized listing.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub author_id: Option<Uuid>,
    pub search: String,
    pub page: Pagination,
}

/// Home feed: posts by accounts `viewer_id` follows.
#[derive(Debug, Clone)]
pub struct FeedQuery {
    pub viewer_id: Uuid,
    pub search: String,
    pub page: Pagination,
}
