//! In-process store with the same contract as `PgStore`.
//!
//! Every mutation runs against a copy of the tables that replaces the live
//! tables only when all of its steps succeed, which mirrors a committed
//! Postgres transaction. `fail_counter_updates` makes the counter step fail
//! so rollback behaviour can be observed.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, MutexGuard,
    },
};

use async_trait::async_trait;
use time::{Duration as TimeDuration, OffsetDateTime};
use uuid::Uuid;

use crate::{
    db::{StoreError, StoreResult},
    follows::{
        repo::FollowRepo,
        repo_types::{Counter, EdgeFilter, FollowEdge},
    },
    posts::{
        repo::PostRepo,
        repo_types::{FeedQuery, PostAuthor, PostFilter, PostView},
    },
    users::{
        repo::UserRepo,
        repo_types::{NewUser, User, UserChanges, UserFilter},
    },
    validation::Pagination,
};

#[derive(Debug, Clone)]
struct PostRecord {
    id: Uuid,
    user_id: Uuid,
    content: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    edges: HashMap<Uuid, FollowEdge>,
    posts: HashMap<Uuid, PostRecord>,
    last_tick: Option<OffsetDateTime>,
}

impl Tables {
    /// Strictly increasing timestamps so "newest first" is well defined.
    fn tick(&mut self) -> OffsetDateTime {
        let now = OffsetDateTime::now_utc();
        let next = match self.last_tick {
            Some(last) if now <= last => last + TimeDuration::microseconds(1),
            _ => now,
        };
        self.last_tick = Some(next);
        next
    }

    fn adjust(&mut self, counter: Counter, user_id: Uuid, delta: i64) -> StoreResult<()> {
        let user = self.users.get_mut(&user_id).ok_or_else(|| {
            StoreError::Invariant(format!("counter target {user_id} does not exist"))
        })?;
        let slot = match counter {
            Counter::Followers => &mut user.followers_count,
            Counter::Following => &mut user.following_count,
        };
        let next = *slot + delta;
        if next < 0 {
            return Err(StoreError::Invariant(format!(
                "{} of user {user_id} cannot move by {delta}",
                counter.column()
            )));
        }
        *slot = next;
        Ok(())
    }

    fn view(&self, post: &PostRecord) -> Option<PostView> {
        let author = self.users.get(&post.user_id)?;
        Some(PostView {
            id: post.id,
            user_id: post.user_id,
            content: post.content.clone(),
            created_at: post.created_at,
            updated_at: post.updated_at,
            user: PostAuthor {
                id: author.id,
                full_name: author.full_name.clone(),
                avatar_url: author.avatar_url.clone(),
            },
        })
    }

    fn follows(&self, follower_id: Uuid, followed_id: Uuid) -> bool {
        self.edges
            .values()
            .any(|e| e.follower_id == follower_id && e.followed_id == followed_id)
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    needle.is_empty() || haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn paginate<T>(mut items: Vec<T>, page: &Pagination) -> Vec<T> {
    let skip = usize::try_from(page.skip).unwrap_or(0);
    let limit = usize::try_from(page.limit).unwrap_or(0);
    if skip >= items.len() {
        return Vec::new();
    }
    items.drain(..skip);
    items.truncate(limit);
    items
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_counters: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every counter adjustment fails after the edge mutation
    /// has been staged.
    pub fn fail_counter_updates(&self, fail: bool) {
        self.fail_counters.store(fail, Ordering::SeqCst);
    }

    pub fn edge_count(&self) -> usize {
        self.lock().edges.len()
    }

    /// Counters recomputed from the edge set: (followers, following).
    pub fn recount(&self, user_id: Uuid) -> (i64, i64) {
        let tables = self.lock();
        let followers = tables.edges.values().filter(|e| e.followed_id == user_id).count();
        let following = tables.edges.values().filter(|e| e.follower_id == user_id).count();
        (followers as i64, following as i64)
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Applies `f` to a staged copy and publishes it only on success.
    fn transaction<T>(
        &self,
        f: impl FnOnce(&mut Tables, bool) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut live = self.lock();
        let mut staged = live.clone();
        let out = f(&mut staged, self.fail_counters.load(Ordering::SeqCst))?;
        *live = staged;
        Ok(out)
    }
}

fn counter_step(
    tables: &mut Tables,
    fail: bool,
    counter: Counter,
    user_id: Uuid,
    delta: i64,
) -> StoreResult<()> {
    if fail {
        return Err(StoreError::Invariant("injected counter failure".into()));
    }
    tables.adjust(counter, user_id, delta)
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.lock().users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.lock().users.values().find(|u| u.email == email).cloned())
    }

    async fn list(&self, filter: &UserFilter) -> StoreResult<Vec<User>> {
        let tables = self.lock();
        let mut users: Vec<User> = tables
            .users
            .values()
            .filter(|u| contains_ci(&u.full_name, &filter.search))
            .filter(|u| filter.follower_id.map_or(true, |f| tables.follows(f, u.id)))
            .filter(|u| filter.followed_id.map_or(true, |f| tables.follows(u.id, f)))
            .cloned()
            .collect();
        users.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(paginate(users, &filter.page))
    }

    async fn insert(&self, user: NewUser) -> StoreResult<User> {
        self.transaction(|t, _| {
            if t.users.values().any(|u| u.email == user.email) {
                return Err(StoreError::UniqueViolation);
            }
            let now = t.tick();
            let created = User {
                id: Uuid::new_v4(),
                full_name: user.full_name,
                biography: user.biography,
                location: user.location,
                birthdate: user.birthdate,
                gender: user.gender,
                avatar_url: user.avatar_url,
                cover_url: user.cover_url,
                email: user.email,
                password_hash: user.password_hash,
                is_active: user.is_active,
                is_superuser: user.is_superuser,
                followers_count: 0,
                following_count: 0,
                created_at: now,
                updated_at: now,
            };
            t.users.insert(created.id, created.clone());
            Ok(created)
        })
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> StoreResult<Option<User>> {
        self.transaction(|t, _| {
            let now = t.tick();
            let Some(user) = t.users.get_mut(&id) else {
                return Ok(None);
            };
            if let Some(v) = changes.full_name {
                user.full_name = v;
            }
            if let Some(v) = changes.biography {
                user.biography = v;
            }
            if let Some(v) = changes.location {
                user.location = v;
            }
            if let Some(v) = changes.birthdate {
                user.birthdate = Some(v);
            }
            if let Some(v) = changes.gender {
                user.gender = v;
            }
            if let Some(v) = changes.avatar_url {
                user.avatar_url = v;
            }
            if let Some(v) = changes.cover_url {
                user.cover_url = v;
            }
            if let Some(v) = changes.password_hash {
                user.password_hash = v;
            }
            if let Some(v) = changes.is_active {
                user.is_active = v;
            }
            if let Some(v) = changes.is_superuser {
                user.is_superuser = v;
            }
            user.updated_at = now;
            Ok(Some(user.clone()))
        })
    }
}

#[async_trait]
impl FollowRepo for MemoryStore {
    async fn find(&self, id: Uuid) -> StoreResult<Option<FollowEdge>> {
        Ok(self.lock().edges.get(&id).cloned())
    }

    async fn find_by_pair(
        &self,
        follower_id: Uuid,
        followed_id: Uuid,
    ) -> StoreResult<Option<FollowEdge>> {
        Ok(self
            .lock()
            .edges
            .values()
            .find(|e| e.follower_id == follower_id && e.followed_id == followed_id)
            .cloned())
    }

    async fn list(&self, filter: &EdgeFilter) -> StoreResult<Vec<FollowEdge>> {
        let mut edges: Vec<FollowEdge> = self
            .lock()
            .edges
            .values()
            .filter(|e| filter.follower_id.map_or(true, |id| e.follower_id == id))
            .filter(|e| filter.followed_id.map_or(true, |id| e.followed_id == id))
            .cloned()
            .collect();
        edges.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(paginate(edges, &filter.page))
    }

    async fn insert_counted(
        &self,
        follower_id: Uuid,
        followed_id: Uuid,
    ) -> StoreResult<FollowEdge> {
        self.transaction(|t, fail| {
            if follower_id == followed_id {
                return Err(StoreError::CheckViolation);
            }
            if !t.users.contains_key(&follower_id) || !t.users.contains_key(&followed_id) {
                return Err(StoreError::ForeignKeyViolation);
            }
            if t.follows(follower_id, followed_id) {
                return Err(StoreError::UniqueViolation);
            }
            let now = t.tick();
            let edge = FollowEdge {
                id: Uuid::new_v4(),
                follower_id,
                followed_id,
                created_at: now,
                updated_at: now,
            };
            t.edges.insert(edge.id, edge.clone());

            counter_step(t, fail, Counter::Followers, followed_id, 1)?;
            counter_step(t, fail, Counter::Following, follower_id, 1)?;
            Ok(edge)
        })
    }

    async fn delete_counted(&self, id: Uuid) -> StoreResult<Option<FollowEdge>> {
        self.transaction(|t, fail| {
            let Some(edge) = t.edges.remove(&id) else {
                return Ok(None);
            };
            counter_step(t, fail, Counter::Followers, edge.followed_id, -1)?;
            counter_step(t, fail, Counter::Following, edge.follower_id, -1)?;
            Ok(Some(edge))
        })
    }

    async fn remove_user(&self, user_id: Uuid) -> StoreResult<bool> {
        self.transaction(|t, fail| {
            if t.users.remove(&user_id).is_none() {
                return Ok(false);
            }
            let touching: Vec<FollowEdge> = t
                .edges
                .values()
                .filter(|e| e.follower_id == user_id || e.followed_id == user_id)
                .cloned()
                .collect();
            for edge in touching {
                t.edges.remove(&edge.id);
                if edge.follower_id == user_id {
                    counter_step(t, fail, Counter::Followers, edge.followed_id, -1)?;
                } else {
                    counter_step(t, fail, Counter::Following, edge.follower_id, -1)?;
                }
            }
            t.posts.retain(|_, p| p.user_id != user_id);
            Ok(true)
        })
    }
}

#[async_trait]
impl PostRepo for MemoryStore {
    async fn find(&self, id: Uuid) -> StoreResult<Option<PostView>> {
        let tables = self.lock();
        Ok(tables.posts.get(&id).and_then(|p| tables.view(p)))
    }

    async fn list(&self, filter: &PostFilter) -> StoreResult<Vec<PostView>> {
        let tables = self.lock();
        let mut posts: Vec<PostView> = tables
            .posts
            .values()
            .filter(|p| contains_ci(&p.content, &filter.search))
            .filter(|p| filter.author_id.map_or(true, |id| p.user_id == id))
            .filter_map(|p| tables.view(p))
            .collect();
        posts.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(paginate(posts, &filter.page))
    }

    async fn home_feed(&self, query: &FeedQuery) -> StoreResult<Vec<PostView>> {
        let tables = self.lock();
        let mut posts: Vec<PostView> = tables
            .posts
            .values()
            .filter(|p| contains_ci(&p.content, &query.search))
            .filter(|p| tables.follows(query.viewer_id, p.user_id))
            .filter_map(|p| tables.view(p))
            .collect();
        posts.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(paginate(posts, &query.page))
    }

    async fn insert(&self, user_id: Uuid, content: &str) -> StoreResult<PostView> {
        self.transaction(|t, _| {
            if !t.users.contains_key(&user_id) {
                return Err(StoreError::ForeignKeyViolation);
            }
            let now = t.tick();
            let post = PostRecord {
                id: Uuid::new_v4(),
                user_id,
                content: content.to_string(),
                created_at: now,
                updated_at: now,
            };
            t.posts.insert(post.id, post.clone());
            t.view(&post)
                .ok_or_else(|| StoreError::Invariant("post author vanished".into()))
        })
    }

    async fn update(&self, id: Uuid, content: &str) -> StoreResult<Option<PostView>> {
        self.transaction(|t, _| {
            let now = t.tick();
            let Some(post) = t.posts.get_mut(&id) else {
                return Ok(None);
            };
            post.content = content.to_string();
            post.updated_at = now;
            let post = post.clone();
            Ok(t.view(&post))
        })
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        self.transaction(|t, _| Ok(t.posts.remove(&id).is_some()))
    }
}
