use anyhow::Context;
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::password::{hash_password, MIN_PASSWORD_CHARS},
    config::FirstSuperuser,
    db::StoreError,
    error::AppError,
    mail,
    state::AppState,
    users::{
        dto::{CreateUserRequest, UpdateUserRequest, UserListQuery},
        repo::UserRepo,
        repo_types::{NewUser, User, UserChanges, UserFilter},
    },
    validation::{normalize_email, FieldErrors},
};

const MIN_NAME_CHARS: usize = 3;

fn validate_create(req: &CreateUserRequest, email: &str) -> Result<(), AppError> {
    let mut errors = FieldErrors::new();
    errors.min_chars("fullName", req.full_name.trim(), MIN_NAME_CHARS);
    errors.email("email", email);
    errors.min_chars("password", &req.password, MIN_PASSWORD_CHARS);
    errors.optional_url("avatarUrl", req.avatar_url.as_deref());
    errors.optional_url("coverUrl", req.cover_url.as_deref());
    errors.finish()
}

fn validate_update(req: &UpdateUserRequest) -> Result<(), AppError> {
    let mut errors = FieldErrors::new();
    if let Some(name) = &req.full_name {
        errors.min_chars("fullName", name.trim(), MIN_NAME_CHARS);
    }
    if let Some(password) = &req.password {
        errors.min_chars("password", password, MIN_PASSWORD_CHARS);
    }
    errors.optional_url("avatarUrl", req.avatar_url.as_deref());
    errors.optional_url("coverUrl", req.cover_url.as_deref());
    errors.finish()
}

/// Registers a new account. With open registration the caller is anonymous
/// and the privilege flags are forced; otherwise the caller has already been
/// checked to be a superuser and the flags come from the body.
pub async fn create_user(
    state: &AppState,
    req: CreateUserRequest,
    open_registration: bool,
) -> Result<User, AppError> {
    let email = normalize_email(&req.email);
    validate_create(&req, &email)?;

    if state.users.find_by_email(&email).await?.is_some() {
        return Err(AppError::UserAlreadyRegistered);
    }

    let (is_active, is_superuser) = if open_registration {
        (true, false)
    } else {
        (req.is_active.unwrap_or(true), req.is_superuser.unwrap_or(false))
    };

    let new_user = NewUser {
        full_name: req.full_name.trim().to_string(),
        biography: req.biography.unwrap_or_default(),
        location: req.location.unwrap_or_default(),
        birthdate: req.birthdate,
        gender: req.gender.unwrap_or_default(),
        avatar_url: req.avatar_url.unwrap_or_default(),
        cover_url: req.cover_url.unwrap_or_default(),
        email,
        password_hash: hash_password(&req.password)?,
        is_active,
        is_superuser,
    };

    let user = state.users.insert(new_user).await.map_err(|e| match e {
        StoreError::UniqueViolation => AppError::UserAlreadyRegistered,
        other => other.into(),
    })?;

    mail::send_welcome_email(state.mailer.clone(), &state.config, &user.email, &user.full_name);
    info!(user_id = %user.id, is_superuser, "user created");
    Ok(user)
}

pub async fn list_users(state: &AppState, query: UserListQuery) -> Result<Vec<User>, AppError> {
    let page = query.page()?;
    let filter = UserFilter {
        follower_id: query.follower_id,
        followed_id: query.followed_id,
        search: query.search,
        page,
    };
    Ok(state.users.list(&filter).await?)
}

pub async fn get_user(state: &AppState, id: Uuid) -> Result<User, AppError> {
    state.users.find_by_id(id).await?.ok_or(AppError::UserNotFound)
}

/// Self-service or superuser update. Only superusers may move the
/// superuser flag.
pub async fn update_user(
    state: &AppState,
    viewer: &User,
    id: Uuid,
    req: UpdateUserRequest,
) -> Result<User, AppError> {
    let target = get_user(state, id).await?;
    if target.id != viewer.id && !viewer.is_superuser {
        return Err(AppError::InsufficientPrivileges);
    }
    validate_update(&req)?;

    let password_hash = req.password.as_deref().map(hash_password).transpose()?;
    let changes = UserChanges {
        full_name: req.full_name.map(|n| n.trim().to_string()),
        biography: req.biography,
        location: req.location,
        birthdate: req.birthdate,
        gender: req.gender,
        avatar_url: req.avatar_url,
        cover_url: req.cover_url,
        password_hash,
        is_active: req.is_active,
        is_superuser: if viewer.is_superuser { req.is_superuser } else { None },
    };

    let user = state
        .users
        .update(target.id, changes)
        .await?
        .ok_or(AppError::UserNotFound)?;
    info!(user_id = %user.id, by = %viewer.id, "user updated");
    Ok(user)
}

/// Removes the account with its posts and edges; counterpart counters are
/// corrected in the same unit.
pub async fn delete_user(state: &AppState, id: Uuid) -> Result<(), AppError> {
    if !state.follows.remove_user(id).await? {
        return Err(AppError::UserNotFound);
    }
    info!(user_id = %id, "user deleted");
    Ok(())
}

pub async fn ensure_first_superuser(
    users: &dyn UserRepo,
    cfg: &FirstSuperuser,
) -> anyhow::Result<()> {
    let email = normalize_email(&cfg.email);
    if users.find_by_email(&email).await?.is_some() {
        return Ok(());
    }
    let password_hash = hash_password(&cfg.password)
        .map_err(|e| anyhow::anyhow!("{e}"))
        .context("hash first superuser password")?;
    let user = users
        .insert(NewUser {
            full_name: "Superuser".into(),
            biography: String::new(),
            location: String::new(),
            birthdate: None,
            gender: String::new(),
            avatar_url: String::new(),
            cover_url: String::new(),
            email,
            password_hash,
            is_active: true,
            is_superuser: true,
        })
        .await
        .context("insert first superuser")?;
    info!(user_id = %user.id, "first superuser created");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: &str) -> CreateUserRequest {
        CreateUserRequest {
            full_name: "Ana Lima".into(),
            email: email.into(),
            password: "password123".into(),
            biography: None,
            location: Some("Lisbon".into()),
            birthdate: None,
            gender: None,
            avatar_url: None,
            cover_url: None,
            is_active: Some(false),
            is_superuser: Some(true),
        }
    }

    #[tokio::test]
    async fn open_registration_forces_flags() {
        let state = AppState::fake();
        let user = create_user(&state, request("Ana@Example.com"), true).await.unwrap();
        assert!(user.is_active);
        assert!(!user.is_superuser);
        assert_eq!(user.email, "ana@example.com");
        assert_eq!((user.followers_count, user.following_count), (0, 0));

        let closed = create_user(&state, request("bo@example.com"), false).await.unwrap();
        assert!(!closed.is_active);
        assert!(closed.is_superuser);
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let state = AppState::fake();
        create_user(&state, request("ana@example.com"), true).await.unwrap();
        let err = create_user(&state, request("ANA@example.com"), true).await.unwrap_err();
        assert!(matches!(err, AppError::UserAlreadyRegistered));
    }

    #[tokio::test]
    async fn create_validates_every_field() {
        let state = AppState::fake();
        let mut req = request("nope");
        req.full_name = "Al".into();
        req.password = "short".into();
        req.avatar_url = Some("not a url".into());
        let AppError::Validation(fields) = create_user(&state, req, true).await.unwrap_err() else {
            panic!("expected validation error");
        };
        for field in ["fullName", "email", "password", "avatarUrl"] {
            assert!(fields.get(field).is_some(), "{field} should be reported");
        }
    }

    #[tokio::test]
    async fn only_superusers_touch_other_accounts_and_the_flag() {
        let state = AppState::fake();
        let ana = create_user(&state, request("ana@example.com"), true).await.unwrap();
        let bo = create_user(&state, request("bo@example.com"), true).await.unwrap();

        let err = update_user(&state, &ana, bo.id, UpdateUserRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InsufficientPrivileges));

        let promoted = update_user(
            &state,
            &ana,
            ana.id,
            UpdateUserRequest {
                full_name: Some("Ana Maria".into()),
                is_superuser: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(promoted.full_name, "Ana Maria");
        assert!(!promoted.is_superuser);

        let mut root = ana.clone();
        root.is_superuser = true;
        let bo = update_user(
            &state,
            &root,
            bo.id,
            UpdateUserRequest {
                is_superuser: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(bo.is_superuser);
    }

    #[tokio::test]
    async fn listing_rejects_bad_pages() {
        let state = AppState::fake();
        let query = UserListQuery {
            follower_id: None,
            followed_id: None,
            search: String::new(),
            skip: 0,
            limit: 0,
        };
        assert!(matches!(list_users(&state, query).await, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn first_superuser_is_created_once() {
        let state = AppState::fake();
        let cfg = FirstSuperuser {
            email: "root@example.com".into(),
            password: "changethis".into(),
        };
        ensure_first_superuser(state.users.as_ref(), &cfg).await.unwrap();
        ensure_first_superuser(state.users.as_ref(), &cfg).await.unwrap();
        let root = state.users.find_by_email("root@example.com").await.unwrap().unwrap();
        assert!(root.is_superuser && root.is_active);
        let all = list_users(
            &state,
            UserListQuery {
                follower_id: None,
                followed_id: None,
                search: String::new(),
                skip: 0,
                limit: 20,
            },
        )
        .await
        .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn deleting_unknown_user_is_not_found() {
        let state = AppState::fake();
        assert!(matches!(
            delete_user(&state, Uuid::new_v4()).await,
            Err(AppError::UserNotFound)
        ));
    }
}
