use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::{
    db::{bounded, PgStore, StoreError, StoreResult},
    follows::repo_types::{Counter, EdgeFilter, FollowEdge},
};

const EDGE_COLUMNS: &str = "id, follower_id, followed_id, created_at, updated_at";

/// Relationship store. This is the only code allowed to write
/// `users.followers_count` / `users.following_count`; every mutation here
/// moves the edge set and both counters in one transaction.
#[async_trait]
pub trait FollowRepo: Send + Sync {
    async fn find(&self, id: Uuid) -> StoreResult<Option<FollowEdge>>;
    async fn find_by_pair(&self, follower_id: Uuid, followed_id: Uuid)
        -> StoreResult<Option<FollowEdge>>;
    async fn list(&self, filter: &EdgeFilter) -> StoreResult<Vec<FollowEdge>>;

    /// Inserts the edge and increments both counters atomically.
    /// A duplicate pair fails with `UniqueViolation`, a missing user with
    /// `ForeignKeyViolation`.
    async fn insert_counted(&self, follower_id: Uuid, followed_id: Uuid)
        -> StoreResult<FollowEdge>;

    /// Deletes the edge and decrements both counters atomically. Returns
    /// `None`, touching no counter, when no row was removed.
    async fn delete_counted(&self, id: Uuid) -> StoreResult<Option<FollowEdge>>;

    /// Removes a user together with every edge touching it, decrementing
    /// the counters of each counterpart. Returns false if the user was absent.
    async fn remove_user(&self, user_id: Uuid) -> StoreResult<bool>;
}

/// Row locks taken on `users` before any counter moves.
#[derive(Debug, Clone, Copy)]
enum UserLock {
    /// Counter updates only; foreign-key checks from other inserts still pass.
    Counters,
    /// The row is about to be deleted.
    Delete,
}

impl UserLock {
    fn clause(self) -> &'static str {
        match self {
            UserLock::Counters => "FOR NO KEY UPDATE",
            UserLock::Delete => "FOR UPDATE",
        }
    }
}

/// Locks the given users in ascending id order and returns the ids that
/// exist. Every transaction that touches more than one user row goes through
/// here first, so two units never wait on each other in opposite order.
async fn lock_users(
    tx: &mut Transaction<'_, Postgres>,
    ids: &[Uuid],
    lock: UserLock,
) -> StoreResult<Vec<Uuid>> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    let locked = sqlx::query_scalar::<_, Uuid>(&format!(
        "SELECT id FROM users WHERE id = ANY($1) ORDER BY id {}",
        lock.clause()
    ))
    .bind(&ids)
    .fetch_all(&mut **tx)
    .await?;
    Ok(locked)
}

/// Ids of every user sharing an edge with `user_id`, sorted.
async fn counterparts(tx: &mut Transaction<'_, Postgres>, user_id: Uuid) -> StoreResult<Vec<Uuid>> {
    let ids = sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT followed_id FROM follower_relations WHERE follower_id = $1
        UNION
        SELECT follower_id FROM follower_relations WHERE followed_id = $1
        ORDER BY 1
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut **tx)
    .await?;
    Ok(ids)
}

async fn adjust_counter(
    tx: &mut Transaction<'_, Postgres>,
    counter: Counter,
    user_id: Uuid,
    delta: i64,
) -> StoreResult<()> {
    let column = counter.column();
    let res = sqlx::query(&format!(
        "UPDATE users SET {column} = {column} + $2 WHERE id = $1 AND {column} + $2 >= 0"
    ))
    .bind(user_id)
    .bind(delta)
    .execute(&mut **tx)
    .await?;
    if res.rows_affected() != 1 {
        return Err(StoreError::Invariant(format!(
            "{column} of user {user_id} cannot move by {delta}"
        )));
    }
    Ok(())
}

/// Attempts `remove_user` makes before giving up on a user whose edge set
/// keeps changing between the scan and the lock.
const REMOVE_ATTEMPTS: usize = 5;

#[async_trait]
impl FollowRepo for PgStore {
    async fn find(&self, id: Uuid) -> StoreResult<Option<FollowEdge>> {
        bounded(self.timeout, async {
            let edge = sqlx::query_as::<_, FollowEdge>(&format!(
                "SELECT {EDGE_COLUMNS} FROM follower_relations WHERE id = $1"
            ))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
            Ok(edge)
        })
        .await
    }

    async fn find_by_pair(
        &self,
        follower_id: Uuid,
        followed_id: Uuid,
    ) -> StoreResult<Option<FollowEdge>> {
        bounded(self.timeout, async {
            let edge = sqlx::query_as::<_, FollowEdge>(&format!(
                "SELECT {EDGE_COLUMNS} FROM follower_relations \
                 WHERE follower_id = $1 AND followed_id = $2"
            ))
            .bind(follower_id)
            .bind(followed_id)
            .fetch_optional(&self.db)
            .await?;
            Ok(edge)
        })
        .await
    }

    async fn list(&self, filter: &EdgeFilter) -> StoreResult<Vec<FollowEdge>> {
        bounded(self.timeout, async {
            let rows = sqlx::query_as::<_, FollowEdge>(&format!(
                r#"
                SELECT {EDGE_COLUMNS}
                FROM follower_relations
                WHERE ($1::uuid IS NULL OR follower_id = $1)
                  AND ($2::uuid IS NULL OR followed_id = $2)
                ORDER BY created_at DESC, id DESC
                OFFSET $3 LIMIT $4
                "#
            ))
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

    async fn insert_counted(
        &self,
        follower_id: Uuid,
        followed_id: Uuid,
    ) -> StoreResult<FollowEdge> {
        bounded(self.timeout, async {
            let mut tx = self.db.begin().await?;
            lock_users(&mut tx, &[follower_id, followed_id], UserLock::Counters).await?;

            let edge = sqlx::query_as::<_, FollowEdge>(&format!(
                r#"
                INSERT INTO follower_relations (follower_id, followed_id)
                VALUES ($1, $2)
                ON CONFLICT (follower_id, followed_id) DO NOTHING
                RETURNING {EDGE_COLUMNS}
                "#
            ))
            .bind(follower_id)
            .bind(followed_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::UniqueViolation)?;

            adjust_counter(&mut tx, Counter::Followers, followed_id, 1).await?;
            adjust_counter(&mut tx, Counter::Following, follower_id, 1).await?;

            tx.commit().await?;
            Ok(edge)
        })
        .await
    }

    async fn delete_counted(&self, id: Uuid) -> StoreResult<Option<FollowEdge>> {
        bounded(self.timeout, async {
            let mut tx = self.db.begin().await?;

            // Endpoints never change, so an unlocked read is enough to know
            // which user rows to lock.
            let pair = sqlx::query_as::<_, (Uuid, Uuid)>(
                "SELECT follower_id, followed_id FROM follower_relations WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
            let Some((follower_id, followed_id)) = pair else {
                tx.rollback().await?;
                return Ok(None);
            };
            lock_users(&mut tx, &[follower_id, followed_id], UserLock::Counters).await?;

            let removed = sqlx::query_as::<_, FollowEdge>(&format!(
                "DELETE FROM follower_relations WHERE id = $1 RETURNING {EDGE_COLUMNS}"
            ))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

            let Some(edge) = removed else {
                tx.rollback().await?;
                return Ok(None);
            };

            adjust_counter(&mut tx, Counter::Followers, edge.followed_id, -1).await?;
            adjust_counter(&mut tx, Counter::Following, edge.follower_id, -1).await?;

            tx.commit().await?;
            Ok(Some(edge))
        })
        .await
    }

    async fn remove_user(&self, user_id: Uuid) -> StoreResult<bool> {
        bounded(self.timeout, async {
            for _ in 0..REMOVE_ATTEMPTS {
                let mut tx = self.db.begin().await?;

                let mut ids = counterparts(&mut tx, user_id).await?;
                ids.push(user_id);
                // FOR UPDATE on the user also blocks new edges to it until commit.
                let locked = lock_users(&mut tx, &ids, UserLock::Delete).await?;
                if !locked.contains(&user_id) {
                    tx.rollback().await?;
                    return Ok(false);
                }

                // An edge committed between the scan and the lock names a
                // counterpart outside the locked set; start over.
                let current = counterparts(&mut tx, user_id).await?;
                if current.iter().any(|id| !locked.contains(id)) {
                    tx.rollback().await?;
                    continue;
                }

                let edges = sqlx::query_as::<_, FollowEdge>(&format!(
                    "DELETE FROM follower_relations \
                     WHERE follower_id = $1 OR followed_id = $1 \
                     RETURNING {EDGE_COLUMNS}"
                ))
                .bind(user_id)
                .fetch_all(&mut *tx)
                .await?;

                for edge in &edges {
                    if edge.follower_id == user_id {
                        adjust_counter(&mut tx, Counter::Followers, edge.followed_id, -1).await?;
                    } else {
                        adjust_counter(&mut tx, Counter::Following, edge.follower_id, -1).await?;
                    }
                }

                sqlx::query("DELETE FROM users WHERE id = $1")
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await?;

                tx.commit().await?;
                return Ok(true);
            }
            Err(StoreError::Invariant(format!(
                "edges of user {user_id} kept changing during removal"
            )))
        })
        .await
    }
}
