use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{LoginForm, RecoverPasswordRequest, ResetPasswordRequest, TokenResponse},
        extractors::ActiveUser,
        services,
    },
    dto::Message,
    error::AppError,
    extract::{AppForm, AppJson},
    state::AppState,
    users::repo_types::User,
};

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/account/current", get(current_account))
        .route("/account/login", post(login))
        .route("/account/recover-password", post(recover_password))
        .route("/account/reset-password", post(reset_password))
}

#[instrument(skip_all)]
pub async fn current_account(ActiveUser(user): ActiveUser) -> Json<User> {
    Json(user)
}

#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    AppForm(form): AppForm<LoginForm>,
) -> Result<Json<TokenResponse>, AppError> {
    let access_token = services::login(&state, &form.username, &form.password).await?;
    Ok(Json(TokenResponse {
        access_token,
        token_type: "Bearer",
    }))
}

#[instrument(skip(state, body))]
pub async fn recover_password(
    State(state): State<AppState>,
    AppJson(body): AppJson<RecoverPasswordRequest>,
) -> Result<Json<Message>, AppError> {
    services::recover_password(&state, &body.email).await?;
    Ok(Json(Message::new("email_sent")))
}

#[instrument(skip(state, body))]
pub async fn reset_password(
    State(state): State<AppState>,
    AppJson(body): AppJson<ResetPasswordRequest>,
) -> Result<Json<Message>, AppError> {
    services::reset_password(&state, &body.token, &body.new_password).await?;
    Ok(Json(Message::new("password_updated")))
}
