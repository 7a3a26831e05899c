use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    db::{bounded, PgStore, StoreResult},
    users::repo_types::{NewUser, User, UserChanges, UserFilter},
};

const USER_COLUMNS: &str = "id, full_name, biography, location, birthdate, gender, avatar_url, \
     cover_url, email, password_hash, is_active, is_superuser, followers_count, \
     following_count, created_at, updated_at";

/// Credential store. Counter columns are read here but never written;
/// see `FollowRepo`.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn list(&self, filter: &UserFilter) -> StoreResult<Vec<User>>;
    async fn insert(&self, user: NewUser) -> StoreResult<User>;
    async fn update(&self, id: Uuid, changes: UserChanges) -> StoreResult<Option<User>>;
}

#[async_trait]
impl UserRepo for PgStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        bounded(self.timeout, async {
            let user = sqlx::query_as::<_, User>(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
            ))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
            Ok(user)
        })
        .await
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        bounded(self.timeout, async {
            let user = sqlx::query_as::<_, User>(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
            ))
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
            Ok(user)
        })
        .await
    }

    async fn list(&self, filter: &UserFilter) -> StoreResult<Vec<User>> {
        bounded(self.timeout, async {
            let rows = sqlx::query_as::<_, User>(&format!(
                r#"
                SELECT {USER_COLUMNS}
                FROM users u
                WHERE ($1 = '' OR strpos(lower(u.full_name), lower($1)) > 0)
                  AND ($2::uuid IS NULL OR EXISTS (
                        SELECT 1 FROM follower_relations f
                        WHERE f.follower_id = $2 AND f.followed_id = u.id))
                  AND ($3::uuid IS NULL OR EXISTS (
                        SELECT 1 FROM follower_relations f
                        WHERE f.followed_id = $3 AND f.follower_id = u.id))
                ORDER BY u.created_at DESC, u.id DESC
                OFFSET $4 LIMIT $5
                "#
            ))
            .bind(&filter.search)
            .bind(filter.follower_id)
            .bind(filter.followed_id)
            .bind(filter.page.skip)
            .bind(filter.page.limit)
            .fetch_all(&self.db)
            .await?;
            Ok(rows)
        })
        .await
    }

    async fn insert(&self, user: NewUser) -> StoreResult<User> {
        bounded(self.timeout, async {
            let created = sqlx::query_as::<_, User>(&format!(
                r#"
                INSERT INTO users (full_name, biography, location, birthdate, gender,
                                   avatar_url, cover_url, email, password_hash,
                                   is_active, is_superuser)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                RETURNING {USER_COLUMNS}
                "#
            ))
            .bind(&user.full_name)
            .bind(&user.biography)
            .bind(&user.location)
            .bind(user.birthdate)
            .bind(&user.gender)
            .bind(&user.avatar_url)
            .bind(&user.cover_url)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.is_active)
            .bind(user.is_superuser)
            .fetch_one(&self.db)
            .await?;
            Ok(created)
        })
        .await
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> StoreResult<Option<User>> {
        bounded(self.timeout, async {
            let user = sqlx::query_as::<_, User>(&format!(
                r#"
                UPDATE users SET
                    full_name     = COALESCE($2, full_name),
                    biography     = COALESCE($3, biography),
                    location      = COALESCE($4, location),
                    birthdate     = COALESCE($5, birthdate),
                    gender        = COALESCE($6, gender),
                    avatar_url    = COALESCE($7, avatar_url),
                    cover_url     = COALESCE($8, cover_url),
                    password_hash = COALESCE($9, password_hash),
                    is_active     = COALESCE($10, is_active),
                    is_superuser  = COALESCE($11, is_superuser),
                    updated_at    = now()
                WHERE id = $1
                RETURNING {USER_COLUMNS}
                "#
            ))
            .bind(id)
            .bind(changes.full_name)
            .bind(changes.biography)
            .bind(changes.location)
            .bind(changes.birthdate)
            .bind(changes.gender)
            .bind(changes.avatar_url)
            .bind(changes.cover_url)
            .bind(changes.password_hash)
            .bind(changes.is_active)
            .bind(changes.is_superuser)
            .fetch_optional(&self.db)
            .await?;
            Ok(user)
        })
        .await
    }
}
