use tracing::info;
use uuid::Uuid;

use crate::{
    error::AppError,
    posts::{
        dto::{FeedParams, PostListQuery},
        repo_types::{FeedQuery, PostFilter, PostView},
    },
    state::AppState,
    users::repo_types::User,
    validation::FieldErrors,
};

fn validate_content(content: &str) -> Result<(), AppError> {
    let mut errors = FieldErrors::new();
    errors.check(!content.trim().is_empty(), "content", "is required");
    errors.finish()
}

/// Personalised feed: newest posts by accounts the viewer follows.
pub async fn home_feed(
    state: &AppState,
    viewer: &User,
    params: FeedParams,
) -> Result<Vec<PostView>, AppError> {
    let page = params.page()?;
    let query = FeedQuery {
        viewer_id: viewer.id,
        search: params.search,
        page,
    };
    Ok(state.posts.home_feed(&query).await?)
}

pub async fn list_all(state: &AppState, query: PostListQuery) -> Result<Vec<PostView>, AppError> {
    let page = query.page()?;
    let filter = PostFilter {
        author_id: query.user_id,
        search: query.search,
        page,
    };
    Ok(state.posts.list(&filter).await?)
}

pub async fn get(state: &AppState, id: Uuid) -> Result<PostView, AppError> {
    state.posts.find(id).await?.ok_or(AppError::PostNotFound)
}

pub async fn create(state: &AppState, author: &User, content: &str) -> Result<PostView, AppError> {
    validate_content(content)?;
    let post = state.posts.insert(author.id, content).await?;
    info!(post_id = %post.id, user_id = %author.id, "post created");
    Ok(post)
}

async fn owned(state: &AppState, viewer: &User, id: Uuid) -> Result<PostView, AppError> {
    let post = get(state, id).await?;
    if post.user_id != viewer.id && !viewer.is_superuser {
        return Err(AppError::InsufficientPrivileges);
    }
    Ok(post)
}

pub async fn update(
    state: &AppState,
    viewer: &User,
    id: Uuid,
    content: &str,
) -> Result<PostView, AppError> {
    owned(state, viewer, id).await?;
    validate_content(content)?;
    let post = state
        .posts
        .update(id, content)
        .await?
        .ok_or(AppError::PostNotFound)?;
    info!(post_id = %post.id, by = %viewer.id, "post updated");
    Ok(post)
}

pub async fn delete(state: &AppState, viewer: &User, id: Uuid) -> Result<(), AppError> {
    owned(state, viewer, id).await?;
    if !state.posts.delete(id).await? {
        return Err(AppError::PostNotFound);
    }
    info!(post_id = %id, by = %viewer.id, "post deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo_types::NewUser;

    async fn user(state: &AppState, email: &str) -> User {
        state
            .users
            .insert(NewUser {
                full_name: email.into(),
                biography: String::new(),
                location: String::new(),
                birthdate: None,
                gender: String::new(),
                avatar_url: format!("https://cdn.example.com/{email}.png"),
                cover_url: String::new(),
                email: email.into(),
                password_hash: "x".into(),
                is_active: true,
                is_superuser: false,
            })
            .await
            .unwrap()
    }

    fn feed(search: &str, skip: i64, limit: i64) -> FeedParams {
        FeedParams {
            search: search.into(),
            skip,
            limit,
        }
    }

    #[tokio::test]
    async fn feed_keeps_only_followed_authors() {
        let state = AppState::fake();
        let a = user(&state, "a@example.com").await;
        let b = user(&state, "b@example.com").await;
        let c = user(&state, "c@example.com").await;
        state.follows.insert_counted(a.id, b.id).await.unwrap();

        let first = create(&state, &b, "rust tip one").await.unwrap();
        create(&state, &c, "rust tip from c").await.unwrap();
        let second = create(&state, &b, "another Rust tip").await.unwrap();
        create(&state, &b, "unrelated").await.unwrap();

        let posts = home_feed(&state, &a, feed("rust", 0, 20)).await.unwrap();
        let ids: Vec<Uuid> = posts.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
        assert!(posts.iter().all(|p| p.user_id == b.id));
        assert_eq!(posts[0].user.avatar_url, "https://cdn.example.com/b@example.com.png");
    }

    #[tokio::test]
    async fn feed_pagination_boundaries() {
        let state = AppState::fake();
        let a = user(&state, "a@example.com").await;
        let b = user(&state, "b@example.com").await;
        state.follows.insert_counted(a.id, b.id).await.unwrap();
        for i in 0..25 {
            create(&state, &b, &format!("post {i}")).await.unwrap();
        }

        assert_eq!(home_feed(&state, &a, feed("", 0, 20)).await.unwrap().len(), 20);
        assert_eq!(home_feed(&state, &a, feed("", 20, 20)).await.unwrap().len(), 5);
        assert!(home_feed(&state, &a, feed("", 25, 20)).await.unwrap().is_empty());
        assert!(matches!(
            home_feed(&state, &a, feed("", 0, 0)).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn search_text_is_matched_verbatim() {
        let state = AppState::fake();
        let a = user(&state, "a@example.com").await;
        let b = user(&state, "b@example.com").await;
        state.follows.insert_counted(a.id, b.id).await.unwrap();
        let spaced = create(&state, &b, "rust tips").await.unwrap();
        create(&state, &b, "rusty bike").await.unwrap();

        let posts = home_feed(&state, &a, feed("rust ", 0, 20)).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id, spaced.id);

        let all = list_all(
            &state,
            PostListQuery {
                user_id: None,
                search: "rust ".into(),
                skip: 0,
                limit: 20,
            },
        )
        .await
        .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn list_all_filters_by_author() {
        let state = AppState::fake();
        let a = user(&state, "a@example.com").await;
        let b = user(&state, "b@example.com").await;
        create(&state, &a, "mine").await.unwrap();
        create(&state, &b, "theirs").await.unwrap();

        let all = list_all(
            &state,
            PostListQuery {
                user_id: None,
                search: String::new(),
                skip: 0,
                limit: 20,
            },
        )
        .await
        .unwrap();
        assert_eq!(all.len(), 2);

        let mine = list_all(
            &state,
            PostListQuery {
                user_id: Some(a.id),
                search: String::new(),
                skip: 0,
                limit: 20,
            },
        )
        .await
        .unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].content, "mine");
    }

    #[tokio::test]
    async fn edits_require_ownership() {
        let state = AppState::fake();
        let a = user(&state, "a@example.com").await;
        let b = user(&state, "b@example.com").await;
        let post = create(&state, &a, "draft").await.unwrap();

        assert!(matches!(
            update(&state, &b, post.id, "hijack").await,
            Err(AppError::InsufficientPrivileges)
        ));
        assert!(matches!(
            delete(&state, &b, post.id).await,
            Err(AppError::InsufficientPrivileges)
        ));

        let edited = update(&state, &a, post.id, "final").await.unwrap();
        assert_eq!(edited.content, "final");
        assert!(edited.updated_at > post.updated_at);

        assert!(matches!(
            create(&state, &a, "   ").await,
            Err(AppError::Validation(_))
        ));

        delete(&state, &a, post.id).await.unwrap();
        assert!(matches!(get(&state, post.id).await, Err(AppError::PostNotFound)));
        assert!(matches!(
            delete(&state, &a, post.id).await,
            Err(AppError::PostNotFound)
        ));
    }
}
