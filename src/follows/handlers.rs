use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::extractors::ActiveUser,
    dto::Message,
    error::AppError,
    extract::{AppJson, AppPath, AppQuery},
    follows::{
        dto::{CreateFollowRequest, FollowListQuery, FollowerRelationResponse},
        repo_types::FollowEdge,
        services,
    },
    state::AppState,
};

pub fn follow_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/follower-relations",
            get(list_relations).post(create_relation),
        )
        .route(
            "/follower-relations/following/:user_id",
            get(check_relation),
        )
        .route(
            "/follower-relations/:follower_relation_id",
            delete(delete_relation),
        )
}

#[instrument(skip(state, viewer))]
pub async fn create_relation(
    State(state): State<AppState>,
    ActiveUser(viewer): ActiveUser,
    AppJson(body): AppJson<CreateFollowRequest>,
) -> Result<(StatusCode, Json<FollowerRelationResponse>), AppError> {
    let edge = services::create(&state, &viewer, body.followed_id).await?;
    Ok((StatusCode::CREATED, Json(Some(edge).into())))
}

#[instrument(skip(state, _viewer))]
pub async fn list_relations(
    State(state): State<AppState>,
    ActiveUser(_viewer): ActiveUser,
    AppQuery(query): AppQuery<FollowListQuery>,
) -> Result<Json<Vec<FollowEdge>>, AppError> {
    Ok(Json(services::list(&state, query).await?))
}

#[instrument(skip(state, viewer))]
pub async fn check_relation(
    State(state): State<AppState>,
    ActiveUser(viewer): ActiveUser,
    AppPath(user_id): AppPath<Uuid>,
) -> Result<Json<FollowerRelationResponse>, AppError> {
    let edge = services::check(&state, &viewer, user_id).await?;
    Ok(Json(edge.into()))
}

#[instrument(skip(state, viewer))]
pub async fn delete_relation(
    State(state): State<AppState>,
    ActiveUser(viewer): ActiveUser,
    AppPath(follower_relation_id): AppPath<Uuid>,
) -> Result<Json<Message>, AppError> {
    services::delete(&state, &viewer, follower_relation_id).await?;
    Ok(Json(Message::new("follower_relation_deleted")))
}
