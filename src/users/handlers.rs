use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::extractors::{self, ActiveUser, Superuser},
    dto::Message,
    error::AppError,
    extract::{AppJson, AppPath, AppQuery},
    state::AppState,
    users::{
        dto::{CreateUserRequest, UpdateUserRequest, UserListQuery},
        repo_types::User,
        services,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:user_id",
            get(get_user).patch(update_user).delete(delete_user),
        )
}

#[instrument(skip(state, _viewer))]
pub async fn list_users(
    State(state): State<AppState>,
    ActiveUser(_viewer): ActiveUser,
    AppQuery(query): AppQuery<UserListQuery>,
) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(services::list_users(&state, query).await?))
}

#[instrument(skip_all)]
pub async fn create_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    AppJson(body): AppJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let open = state.config.users_open_registration;
    if !open {
        extractors::superuser(&state, &headers).await?;
    }
    let user = services::create_user(&state, body, open).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, _viewer))]
pub async fn get_user(
    State(state): State<AppState>,
    ActiveUser(_viewer): ActiveUser,
    AppPath(user_id): AppPath<Uuid>,
) -> Result<Json<User>, AppError> {
    Ok(Json(services::get_user(&state, user_id).await?))
}

#[instrument(skip(state, viewer, body))]
pub async fn update_user(
    State(state): State<AppState>,
    ActiveUser(viewer): ActiveUser,
    AppPath(user_id): AppPath<Uuid>,
    AppJson(body): AppJson<UpdateUserRequest>,
) -> Result<Json<User>, AppError> {
    Ok(Json(services::update_user(&state, &viewer, user_id, body).await?))
}

#[instrument(skip(state, _admin))]
pub async fn delete_user(
    State(state): State<AppState>,
    Superuser(_admin): Superuser,
    AppPath(user_id): AppPath<Uuid>,
) -> Result<Json<Message>, AppError> {
    services::delete_user(&state, user_id).await?;
    Ok(Json(Message::new("user_deleted")))
}
