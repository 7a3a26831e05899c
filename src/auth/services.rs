use axum::extract::FromRef;
use tracing::{info, warn};

use crate::{
    auth::{
        claims::TokenKind,
        jwt::JwtKeys,
        password::{hash_password, verify_password, MIN_PASSWORD_CHARS},
    },
    error::AppError,
    mail,
    state::AppState,
    users::repo_types::{User, UserChanges},
    validation::{normalize_email, FieldErrors},
};

/// Looks the account up by email and checks the password. A missing
/// account and a wrong password are indistinguishable to the caller.
pub async fn authenticate(state: &AppState, email: &str, password: &str) -> Result<User, AppError> {
    let email = normalize_email(email);
    let Some(user) = state.users.find_by_email(&email).await? else {
        warn!(%email, "login unknown email");
        return Err(AppError::InvalidCredentials);
    };
    if !verify_password(password, &user.password_hash)? {
        warn!(%email, user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }
    Ok(user)
}

pub async fn login(state: &AppState, email: &str, password: &str) -> Result<String, AppError> {
    let user = authenticate(state, email, password).await?;
    let token = JwtKeys::from_ref(state).sign_access(user.id)?;
    info!(user_id = %user.id, "user logged in");
    Ok(token)
}

/// Emails a password-reset link to a registered address.
pub async fn recover_password(state: &AppState, email: &str) -> Result<(), AppError> {
    let mut errors = FieldErrors::new();
    let email = normalize_email(email);
    errors.email("email", &email);
    errors.finish()?;

    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or(AppError::UserNotFound)?;
    let token = JwtKeys::from_ref(state).sign_password_reset(user.id)?;
    mail::send_reset_password_email(state.mailer.clone(), &state.config, &user.email, &token);
    info!(user_id = %user.id, "password reset requested");
    Ok(())
}

pub async fn reset_password(
    state: &AppState,
    token: &str,
    new_password: &str,
) -> Result<(), AppError> {
    let mut errors = FieldErrors::new();
    errors.check(!token.is_empty(), "token", "is required");
    errors.min_chars("newPassword", new_password, MIN_PASSWORD_CHARS);
    errors.finish()?;

    let claims = JwtKeys::from_ref(state).verify(token, TokenKind::PasswordReset)?;
    let user = state
        .users
        .find_by_id(claims.sub)
        .await?
        .ok_or(AppError::UserNotFound)?;
    if !user.is_active {
        return Err(AppError::UserInactive);
    }

    let changes = UserChanges {
        password_hash: Some(hash_password(new_password)?),
        ..Default::default()
    };
    state
        .users
        .update(user.id, changes)
        .await?
        .ok_or(AppError::UserNotFound)?;
    info!(user_id = %user.id, "password reset");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo_types::NewUser;

    async fn seed(state: &AppState, email: &str, password: &str, active: bool) -> User {
        state
            .users
            .insert(NewUser {
                full_name: "Ana Test".into(),
                biography: String::new(),
                location: String::new(),
                birthdate: None,
                gender: String::new(),
                avatar_url: String::new(),
                cover_url: String::new(),
                email: email.into(),
                password_hash: hash_password(password).unwrap(),
                is_active: active,
                is_superuser: false,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn authenticate_hides_which_part_failed() {
        let state = AppState::fake();
        let user = seed(&state, "ana@example.com", "password123", true).await;

        let ok = authenticate(&state, " ANA@example.com ", "password123").await.unwrap();
        assert_eq!(ok.id, user.id);

        let wrong = authenticate(&state, "ana@example.com", "nope-nope").await.unwrap_err();
        let missing = authenticate(&state, "who@example.com", "password123").await.unwrap_err();
        assert_eq!(wrong.code(), "invalid_credentials");
        assert_eq!(missing.code(), "invalid_credentials");
    }

    #[tokio::test]
    async fn reset_replaces_the_password() {
        let state = AppState::fake();
        let user = seed(&state, "ana@example.com", "password123", true).await;
        let token = JwtKeys::from_ref(&state).sign_password_reset(user.id).unwrap();

        reset_password(&state, &token, "brand-new-pass").await.unwrap();

        assert!(authenticate(&state, "ana@example.com", "brand-new-pass").await.is_ok());
        assert!(authenticate(&state, "ana@example.com", "password123").await.is_err());
    }

    #[tokio::test]
    async fn reset_rejects_session_tokens_and_inactive_users() {
        let state = AppState::fake();
        let active = seed(&state, "ana@example.com", "password123", true).await;
        let inactive = seed(&state, "off@example.com", "password123", false).await;
        let keys = JwtKeys::from_ref(&state);

        let session = keys.sign_access(active.id).unwrap();
        assert!(matches!(
            reset_password(&state, &session, "brand-new-pass").await,
            Err(AppError::InvalidJwt)
        ));

        let reset = keys.sign_password_reset(inactive.id).unwrap();
        assert!(matches!(
            reset_password(&state, &reset, "brand-new-pass").await,
            Err(AppError::UserInactive)
        ));

        let short = keys.sign_password_reset(active.id).unwrap();
        assert!(matches!(
            reset_password(&state, &short, "short").await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn recover_requires_a_known_email() {
        let state = AppState::fake();
        seed(&state, "ana@example.com", "password123", true).await;
        assert!(recover_password(&state, "ana@example.com").await.is_ok());
        assert!(matches!(
            recover_password(&state, "nobody@example.com").await,
            Err(AppError::UserNotFound)
        ));
        assert!(matches!(
            recover_password(&state, "not-an-email").await,
            Err(AppError::Validation(_))
        ));
    }
}
