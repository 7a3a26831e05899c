//! Store tests against a live Postgres. They run only when `DATABASE_URL`
//! points at a server the tests may migrate and write to.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use socialnet::{
    db::{self, PgStore, StoreError},
    follows::repo::FollowRepo,
    posts::{repo::PostRepo, repo_types::FeedQuery},
    users::{
        repo::UserRepo,
        repo_types::{NewUser, User},
    },
    validation::Pagination,
};

async fn store() -> Option<PgStore> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping Postgres store test");
        return None;
    };
    let pool = PgPoolOptions::new()
        .max_connections(16)
        .connect(&url)
        .await
        .expect("connect to test database");
    db::migrate(&pool).await.expect("migrate test database");
    Some(PgStore::new(pool, Duration::from_secs(10)))
}

async fn user(store: &PgStore, name: &str) -> User {
    UserRepo::insert(
        store,
        NewUser {
            full_name: name.into(),
            biography: String::new(),
            location: String::new(),
            birthdate: None,
            gender: String::new(),
            avatar_url: String::new(),
            cover_url: String::new(),
            email: format!("{name}-{}@example.com", Uuid::new_v4()),
            password_hash: "x".into(),
            is_active: true,
            is_superuser: false,
        },
    )
    .await
    .unwrap()
}

async fn counts(store: &PgStore, id: Uuid) -> (i64, i64) {
    let u = store.find_by_id(id).await.unwrap().unwrap();
    (u.followers_count, u.following_count)
}

#[tokio::test]
async fn follow_and_unfollow_move_both_counters() {
    let Some(store) = store().await else { return };
    let a = user(&store, "ana").await;
    let b = user(&store, "bo").await;

    let edge = store.insert_counted(a.id, b.id).await.unwrap();
    assert_eq!(counts(&store, a.id).await, (0, 1));
    assert_eq!(counts(&store, b.id).await, (1, 0));

    assert!(matches!(
        store.insert_counted(a.id, b.id).await,
        Err(StoreError::UniqueViolation)
    ));
    assert!(matches!(
        store.insert_counted(a.id, Uuid::new_v4()).await,
        Err(StoreError::ForeignKeyViolation)
    ));
    assert!(matches!(
        store.insert_counted(a.id, a.id).await,
        Err(StoreError::CheckViolation)
    ));
    assert_eq!(counts(&store, a.id).await, (0, 1));
    assert_eq!(counts(&store, b.id).await, (1, 0));

    let removed = store.delete_counted(edge.id).await.unwrap().unwrap();
    assert_eq!(removed.id, edge.id);
    assert!(store.delete_counted(edge.id).await.unwrap().is_none());
    assert_eq!(counts(&store, a.id).await, (0, 0));
    assert_eq!(counts(&store, b.id).await, (0, 0));
}

#[tokio::test]
async fn mutual_follows_at_the_same_time_both_succeed() {
    let Some(store) = store().await else { return };
    for _ in 0..25 {
        let a = user(&store, "ana").await.id;
        let b = user(&store, "bo").await.id;

        let (s1, s2) = (store.clone(), store.clone());
        let (ab, ba) = tokio::join!(
            tokio::spawn(async move { s1.insert_counted(a, b).await }),
            tokio::spawn(async move { s2.insert_counted(b, a).await }),
        );
        let ab = ab.unwrap().unwrap();
        let ba = ba.unwrap().unwrap();
        assert_eq!(counts(&store, a).await, (1, 1));
        assert_eq!(counts(&store, b).await, (1, 1));

        let (s1, s2) = (store.clone(), store.clone());
        let (d1, d2) = tokio::join!(
            tokio::spawn(async move { s1.delete_counted(ab.id).await }),
            tokio::spawn(async move { s2.delete_counted(ba.id).await }),
        );
        assert!(d1.unwrap().unwrap().is_some());
        assert!(d2.unwrap().unwrap().is_some());
        assert_eq!(counts(&store, a).await, (0, 0));
        assert_eq!(counts(&store, b).await, (0, 0));
    }
}

#[tokio::test]
async fn racing_duplicate_follows_count_once() {
    let Some(store) = store().await else { return };
    let a = user(&store, "ana").await.id;
    let b = user(&store, "bo").await.id;

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let s = store.clone();
            tokio::spawn(async move { s.insert_counted(a, b).await })
        })
        .collect();
    let mut created = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => created += 1,
            Err(StoreError::UniqueViolation) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(counts(&store, b).await, (1, 0));
    assert_eq!(counts(&store, a).await, (0, 1));
}

#[tokio::test]
async fn counter_underflow_rolls_the_delete_back() {
    let Some(store) = store().await else { return };
    let a = user(&store, "ana").await;
    let b = user(&store, "bo").await;
    let edge = store.insert_counted(a.id, b.id).await.unwrap();

    sqlx::query("UPDATE users SET followers_count = 0 WHERE id = $1")
        .bind(b.id)
        .execute(store.pool())
        .await
        .unwrap();

    assert!(matches!(
        store.delete_counted(edge.id).await,
        Err(StoreError::Invariant(_))
    ));
    assert!(FollowRepo::find(&store, edge.id).await.unwrap().is_some());
    assert_eq!(counts(&store, a.id).await, (0, 1));
}

#[tokio::test]
async fn removing_a_user_corrects_every_counterpart() {
    let Some(store) = store().await else { return };
    let gone = user(&store, "gone").await;
    let fan = user(&store, "fan").await;
    let idol = user(&store, "idol").await;
    store.insert_counted(fan.id, gone.id).await.unwrap();
    store.insert_counted(gone.id, idol.id).await.unwrap();
    store.insert_counted(fan.id, idol.id).await.unwrap();
    PostRepo::insert(&store, gone.id, "soon deleted").await.unwrap();

    assert!(store.remove_user(gone.id).await.unwrap());
    assert!(!store.remove_user(gone.id).await.unwrap());
    assert!(store.find_by_id(gone.id).await.unwrap().is_none());
    assert_eq!(counts(&store, fan.id).await, (0, 1));
    assert_eq!(counts(&store, idol.id).await, (1, 0));
}

#[tokio::test]
async fn removing_two_linked_users_at_once() {
    let Some(store) = store().await else { return };
    for _ in 0..10 {
        let a = user(&store, "ana").await.id;
        let b = user(&store, "bo").await.id;
        let c = user(&store, "cy").await.id;
        store.insert_counted(a, b).await.unwrap();
        store.insert_counted(b, a).await.unwrap();
        store.insert_counted(a, c).await.unwrap();
        store.insert_counted(c, b).await.unwrap();

        let (s1, s2) = (store.clone(), store.clone());
        let (ra, rb) = tokio::join!(
            tokio::spawn(async move { s1.remove_user(a).await }),
            tokio::spawn(async move { s2.remove_user(b).await }),
        );
        assert!(ra.unwrap().unwrap());
        assert!(rb.unwrap().unwrap());
        assert_eq!(counts(&store, c).await, (0, 0));
    }
}

#[tokio::test]
async fn home_feed_joins_on_edges_newest_first() {
    let Some(store) = store().await else { return };
    let viewer = user(&store, "viewer").await;
    let followed = user(&store, "followed").await;
    let stranger = user(&store, "stranger").await;
    store.insert_counted(viewer.id, followed.id).await.unwrap();

    let mut expected = Vec::new();
    for i in 0..5 {
        expected.push(PostRepo::insert(&store, followed.id, &format!("Rust note {i}")).await.unwrap().id);
    }
    PostRepo::insert(&store, followed.id, "rusty gate").await.unwrap();
    PostRepo::insert(&store, stranger.id, "Rust note from elsewhere").await.unwrap();
    expected.reverse();

    let query = |search: &str, skip, limit| FeedQuery {
        viewer_id: viewer.id,
        search: search.into(),
        page: Pagination::new(skip, limit).unwrap(),
    };

    let feed = store.home_feed(&query("rust note", 0, 20)).await.unwrap();
    assert_eq!(feed.iter().map(|p| p.id).collect::<Vec<_>>(), expected);
    assert!(feed.iter().all(|p| p.user.full_name == "followed"));

    let second = store.home_feed(&query("", 4, 2)).await.unwrap();
    assert_eq!(second.len(), 2);
    assert!(store.home_feed(&query("", 6, 20)).await.unwrap().is_empty());
}
