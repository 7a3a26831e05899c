//! Relationship service. Edge mutations and the two counters move in one
//! atomic unit inside `FollowRepo`; this layer adds the checks around it.

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    db::StoreError,
    error::AppError,
    follows::{
        dto::FollowListQuery,
        repo_types::{EdgeFilter, FollowEdge},
    },
    state::AppState,
    users::repo_types::User,
    validation::FieldErrors,
};

pub async fn create(
    state: &AppState,
    viewer: &User,
    followed_id: Uuid,
) -> Result<FollowEdge, AppError> {
    if followed_id == viewer.id {
        return Err(AppError::Validation(FieldErrors::single(
            "followedId",
            "cannot follow yourself",
        )));
    }
    if state.users.find_by_id(followed_id).await?.is_none() {
        return Err(AppError::UserNotFound);
    }
    if state.follows.find_by_pair(viewer.id, followed_id).await?.is_some() {
        return Err(AppError::FollowerRelationAlreadyRegistered);
    }

    // The pre-checks can race; the store's constraints have the final say.
    let edge = state
        .follows
        .insert_counted(viewer.id, followed_id)
        .await
        .map_err(|e| match e {
            StoreError::UniqueViolation => AppError::FollowerRelationAlreadyRegistered,
            StoreError::ForeignKeyViolation => AppError::UserNotFound,
            other => other.into(),
        })?;
    info!(
        edge_id = %edge.id,
        follower_id = %edge.follower_id,
        followed_id = %edge.followed_id,
        "follower relation created"
    );
    Ok(edge)
}

/// The viewer's edge to `user_id`, if any.
pub async fn check(
    state: &AppState,
    viewer: &User,
    user_id: Uuid,
) -> Result<Option<FollowEdge>, AppError> {
    Ok(state.follows.find_by_pair(viewer.id, user_id).await?)
}

pub async fn list(state: &AppState, query: FollowListQuery) -> Result<Vec<FollowEdge>, AppError> {
    let page = query.page()?;
    let filter = EdgeFilter {
        follower_id: query.follower_id,
        followed_id: query.followed_id,
        page,
    };
    Ok(state.follows.list(&filter).await?)
}

/// Idempotent: an edge that is already gone counts as deleted and no
/// counter moves.
pub async fn delete(state: &AppState, viewer: &User, edge_id: Uuid) -> Result<(), AppError> {
    let Some(edge) = state.follows.find(edge_id).await? else {
        info!(%edge_id, "follower relation already absent");
        return Ok(());
    };
    if edge.follower_id != viewer.id && !viewer.is_superuser {
        warn!(%edge_id, viewer_id = %viewer.id, "delete of foreign follower relation refused");
        return Err(AppError::InsufficientPrivileges);
    }

    match state.follows.delete_counted(edge_id).await? {
        Some(removed) => info!(
            edge_id = %removed.id,
            follower_id = %removed.follower_id,
            followed_id = %removed.followed_id,
            "follower relation deleted"
        ),
        None => info!(%edge_id, "follower relation removed concurrently"),
    }
    Ok(())
}
