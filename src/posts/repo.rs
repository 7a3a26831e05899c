use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    db::{bounded, PgStore, StoreResult},
    posts::repo_types::{FeedQuery, PostFilter, PostRow, PostView},
};

const POST_SELECT: &str = r#"
    SELECT p.id, p.user_id, p.content, p.created_at, p.updated_at,
           u.full_name AS author_full_name, u.avatar_url AS author_avatar_url
    FROM posts p
    JOIN users u ON u.id = p.user_id
"#;

/// Content store. Reads always come back joined with author display data.
#[async_trait]
pub trait PostRepo: Send + Sync {
    async fn find(&self, id: Uuid) -> StoreResult<Option<PostView>>;
    async fn list(&self, filter: &PostFilter) -> StoreResult<Vec<PostView>>;
    async fn home_feed(&self, query: &FeedQuery) -> StoreResult<Vec<PostView>>;
    async fn insert(&self, user_id: Uuid, content: &str) -> StoreResult<PostView>;
    async fn update(&self, id: Uuid, content: &str) -> StoreResult<Option<PostView>>;
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
impl PostRepo for PgStore {
    async fn find(&self, id: Uuid) -> StoreResult<Option<PostView>> {
        bounded(self.timeout, async {
            let row = sqlx::query_as::<_, PostRow>(&format!("{POST_SELECT} WHERE p.id = $1"))
                .bind(id)
                .fetch_optional(&self.db)
                .await?;
            Ok(row.map(PostView::from))
        })
        .await
    }

    async fn list(&self, filter: &PostFilter) -> StoreResult<Vec<PostView>> {
        bounded(self.timeout, async {
            let rows = sqlx::query_as::<_, PostRow>(&format!(
                r#"{POST_SELECT}
                WHERE ($1 = '' OR strpos(lower(p.content), lower($1)) > 0)
                  AND ($2::uuid IS NULL OR p.user_id = $2)
                ORDER BY p.created_at DESC, p.id DESC
                OFFSET $3 LIMIT $4
                "#
            ))
            .bind(&filter.search)
            .bind(filter.author_id)
            .bind(filter.page.skip)
            .bind(filter.page.limit)
            .fetch_all(&self.db)
            .await?;
            Ok(rows.into_iter().map(PostView::from).collect())
        })
        .await
    }

    async fn home_feed(&self, query: &FeedQuery) -> StoreResult<Vec<PostView>> {
        bounded(self.timeout, async {
            let rows = sqlx::query_as::<_, PostRow>(&format!(
                r#"{POST_SELECT}
                WHERE ($2 = '' OR strpos(lower(p.content), lower($2)) > 0)
                  AND EXISTS (
                      SELECT 1 FROM follower_relations f
                      WHERE f.followed_id = p.user_id AND f.follower_id = $1)
                ORDER BY p.created_at DESC, p.id DESC
                OFFSET $3 LIMIT $4
                "#
            ))
            .bind(query.viewer_id)
            .bind(&query.search)
            .bind(query.page.skip)
            .bind(query.page.limit)
            .fetch_all(&self.db)
            .await?;
            Ok(rows.into_iter().map(PostView::from).collect())
        })
        .await
    }

    async fn insert(&self, user_id: Uuid, content: &str) -> StoreResult<PostView> {
        bounded(self.timeout, async {
            let row = sqlx::query_as::<_, PostRow>(
                r#"
                WITH inserted AS (
                    INSERT INTO posts (user_id, content)
                    VALUES ($1, $2)
                    RETURNING id, user_id, content, created_at, updated_at
                )
                SELECT i.id, i.user_id, i.content, i.created_at, i.updated_at,
                       u.full_name AS author_full_name, u.avatar_url AS author_avatar_url
                FROM inserted i
                JOIN users u ON u.id = i.user_id
                "#,
            )
            .bind(user_id)
            .bind(content)
            .fetch_one(&self.db)
            .await?;
            Ok(row.into())
        })
        .await
    }

    async fn update(&self, id: Uuid, content: &str) -> StoreResult<Option<PostView>> {
        bounded(self.timeout, async {
            let row = sqlx::query_as::<_, PostRow>(
                r#"
                WITH updated AS (
                    UPDATE posts SET content = $2, updated_at = now()
                    WHERE id = $1
                    RETURNING id, user_id, content, created_at, updated_at
                )
                SELECT d.id, d.user_id, d.content, d.created_at, d.updated_at,
                       u.full_name AS author_full_name, u.avatar_url AS author_avatar_url
                FROM updated d
                JOIN users u ON u.id = d.user_id
                "#,
            )
            .bind(id)
            .bind(content)
            .fetch_optional(&self.db)
            .await?;
            Ok(row.map(PostView::from))
        })
        .await
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        bounded(self.timeout, async {
            let res = sqlx::query("DELETE FROM posts WHERE id = $1")
                .bind(id)
                .execute(&self.db)
                .await?;
            Ok(res.rows_affected() == 1)
        })
        .await
    }
}
