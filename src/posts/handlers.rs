use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::extractors::ActiveUser,
    dto::Message,
    error::AppError,
    extract::{AppJson, AppPath, AppQuery},
    posts::{
        dto::{FeedParams, PostBody, PostListQuery},
        repo_types::PostView,
        services,
    },
    state::AppState,
};

pub fn post_routes() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route("/posts/home", get(home_posts))
        .route(
            "/posts/:post_id",
            get(get_post).patch(update_post).delete(delete_post),
        )
}

#[instrument(skip(state, _viewer))]
pub async fn list_posts(
    State(state): State<AppState>,
    ActiveUser(_viewer): ActiveUser,
    AppQuery(query): AppQuery<PostListQuery>,
) -> Result<Json<Vec<PostView>>, AppError> {
    Ok(Json(services::list_all(&state, query).await?))
}

#[instrument(skip(state, viewer))]
pub async fn home_posts(
    State(state): State<AppState>,
    ActiveUser(viewer): ActiveUser,
    AppQuery(params): AppQuery<FeedParams>,
) -> Result<Json<Vec<PostView>>, AppError> {
    Ok(Json(services::home_feed(&state, &viewer, params).await?))
}

#[instrument(skip(state, author, body))]
pub async fn create_post(
    State(state): State<AppState>,
    ActiveUser(author): ActiveUser,
    AppJson(body): AppJson<PostBody>,
) -> Result<(StatusCode, Json<PostView>), AppError> {
    let post = services::create(&state, &author, &body.content).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

#[instrument(skip(state, _viewer))]
pub async fn get_post(
    State(state): State<AppState>,
    ActiveUser(_viewer): ActiveUser,
    AppPath(post_id): AppPath<Uuid>,
) -> Result<Json<PostView>, AppError> {
    Ok(Json(services::get(&state, post_id).await?))
}

#[instrument(skip(state, viewer, body))]
pub async fn update_post(
    State(state): State<AppState>,
    ActiveUser(viewer): ActiveUser,
    AppPath(post_id): AppPath<Uuid>,
    AppJson(body): AppJson<PostBody>,
) -> Result<Json<PostView>, AppError> {
    Ok(Json(services::update(&state, &viewer, post_id, &body.content).await?))
}

#[instrument(skip(state, viewer))]
pub async fn delete_post(
    State(state): State<AppState>,
    ActiveUser(viewer): ActiveUser,
    AppPath(post_id): AppPath<Uuid>,
) -> Result<Json<Message>, AppError> {
    services::delete(&state, &viewer, post_id).await?;
    Ok(Json(Message::new("post_deleted")))
}
