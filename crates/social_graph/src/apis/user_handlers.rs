use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{
    apis::{api_models::response::UserListResponse, middlewares::identity::ActorId},
    models::{
        friend_lists::FriendListAudit,
        relationships::RelationshipStatus,
        user_follows::{FollowCountAudit, ToggleFollowResponse},
        users::{CreateUserRequest, UserResponse},
    },
    utils::errors::{app_error::AppError, error_payload::ErrorPayload},
    AppState,
};

const TAG: &str = "users";

/// Create a user
#[utoipa::path(
    post,
    tag = TAG,
    path = "/",
    operation_id = "createUser",
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Invalid username", body = ErrorPayload),
        (status = 409, description = "Username taken", body = ErrorPayload),
        (status = 500, description = "Internal server error", body = ErrorPayload)
    ),
    request_body = CreateUserRequest
)]
pub(super) async fn create_user(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = app_state.user_service.create_user(&body).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Get a user
#[utoipa::path(
    get,
    tag = TAG,
    path = "/{id}",
    operation_id = "getUser",
    responses(
        (status = 200, description = "The user with its follow counters", body = UserResponse),
        (status = 404, description = "User not found", body = ErrorPayload),
        (status = 500, description = "Internal server error", body = ErrorPayload)
    ),
    params(
        ("id" = Uuid, Path, description = "User ID")
    )
)]
pub(super) async fn get_user(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(app_state.user_service.get_user(id).await?)
}

/// Find a user by username
#[utoipa::path(
    get,
    tag = TAG,
    path = "/username/{username}",
    operation_id = "getUserByUsername",
    responses(
        (status = 200, description = "The user", body = UserResponse),
        (status = 404, description = "User not found", body = ErrorPayload),
        (status = 500, description = "Internal server error", body = ErrorPayload)
    ),
    params(
        ("username" = String, Path, description = "Username")
    )
)]
pub(super) async fn get_user_by_username(
    State(app_state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    app_state
        .user_service
        .get_user_by_username(&username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", username)))
}

/// Follow or unfollow a user
///
/// Follows the user when the caller does not follow them yet, unfollows
/// otherwise.
#[utoipa::path(
    post,
    tag = TAG,
    path = "/{id}/follow",
    operation_id = "toggleFollow",
    responses(
        (status = 200, description = "Follow state after the toggle", body = ToggleFollowResponse),
        (status = 400, description = "Cannot follow yourself", body = ErrorPayload),
        (status = 401, description = "Missing caller identity", body = ErrorPayload),
        (status = 403, description = "One of the users blocked the other", body = ErrorPayload),
        (status = 404, description = "User not found", body = ErrorPayload),
        (status = 500, description = "Internal server error", body = ErrorPayload)
    ),
    params(
        ("id" = Uuid, Path, description = "User ID to follow or unfollow"),
        ("x-user-id" = Uuid, Header, description = "Acting user")
    )
)]
pub(super) async fn toggle_follow(
    State(app_state): State<Arc<AppState>>,
    ActorId(actor_id): ActorId,
    Path(target_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let result = app_state
        .relationship_service
        .toggle_follow(actor_id, target_id)
        .await?;
    Ok((StatusCode::OK, Json(result)))
}

/// Get followers of a user
#[utoipa::path(
    get,
    tag = TAG,
    path = "/{id}/followers",
    operation_id = "getFollowers",
    responses(
        (status = 200, description = "List of followers", body = UserListResponse),
        (status = 404, description = "User not found", body = ErrorPayload),
        (status = 500, description = "Internal server error", body = ErrorPayload)
    ),
    params(
        ("id" = Uuid, Path, description = "User ID")
    )
)]
pub(super) async fn get_followers(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let followers = app_state.user_service.get_followers(id).await?;
    Ok((StatusCode::OK, Json(UserListResponse::from(followers))))
}

/// Get the users a user follows
#[utoipa::path(
    get,
    tag = TAG,
    path = "/{id}/following",
    operation_id = "getFollowing",
    responses(
        (status = 200, description = "List of followed users", body = UserListResponse),
        (status = 404, description = "User not found", body = ErrorPayload),
        (status = 500, description = "Internal server error", body = ErrorPayload)
    ),
    params(
        ("id" = Uuid, Path, description = "User ID")
    )
)]
pub(super) async fn get_following(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let following = app_state.user_service.get_following(id).await?;
    Ok((StatusCode::OK, Json(UserListResponse::from(following))))
}

/// How the caller relates to a user
#[utoipa::path(
    get,
    tag = TAG,
    path = "/{id}/relationship",
    operation_id = "getRelationship",
    responses(
        (status = 200, description = "Follow and friendship state", body = RelationshipStatus),
        (status = 400, description = "Cannot query yourself", body = ErrorPayload),
        (status = 404, description = "User not found", body = ErrorPayload),
        (status = 500, description = "Internal server error", body = ErrorPayload)
    ),
    params(
        ("id" = Uuid, Path, description = "Other user's ID"),
        ("x-user-id" = Uuid, Header, description = "Acting user")
    )
)]
pub(super) async fn get_relationship(
    State(app_state): State<Arc<AppState>>,
    ActorId(actor_id): ActorId,
    Path(target_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let status = app_state
        .relationship_service
        .relationship_between(actor_id, target_id)
        .await?;
    Ok((StatusCode::OK, Json(status)))
}

/// Compare a user's follow counters with their follow edges
#[utoipa::path(
    get,
    tag = TAG,
    path = "/{id}/counts/audit",
    operation_id = "auditFollowCounts",
    responses(
        (status = 200, description = "Stored and recounted values", body = FollowCountAudit),
        (status = 404, description = "User not found", body = ErrorPayload),
        (status = 500, description = "Internal server error", body = ErrorPayload)
    ),
    params(
        ("id" = Uuid, Path, description = "User ID")
    )
)]
pub(super) async fn audit_follow_counts(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let audit = app_state.user_service.audit_follow_counts(id).await?;
    Ok((StatusCode::OK, Json(audit)))
}

/// Rewrite a user's follow counters from their follow edges
#[utoipa::path(
    post,
    tag = TAG,
    path = "/{id}/counts/reconcile",
    operation_id = "reconcileFollowCounts",
    responses(
        (status = 200, description = "Audit taken before the rewrite", body = FollowCountAudit),
        (status = 404, description = "User not found", body = ErrorPayload),
        (status = 500, description = "Internal server error", body = ErrorPayload)
    ),
    params(
        ("id" = Uuid, Path, description = "User ID")
    )
)]
pub(super) async fn reconcile_follow_counts(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let audit = app_state.user_service.reconcile_follow_counts(id).await?;
    Ok((StatusCode::OK, Json(audit)))
}

/// Check that a user's friend list is mirrored by their friends
#[utoipa::path(
    get,
    tag = TAG,
    path = "/{id}/friends/audit",
    operation_id = "auditFriendList",
    responses(
        (status = 200, description = "Friends missing the user from their own list", body = FriendListAudit),
        (status = 404, description = "User not found", body = ErrorPayload),
        (status = 500, description = "Internal server error", body = ErrorPayload)
    ),
    params(
        ("id" = Uuid, Path, description = "User ID")
    )
)]
pub(super) async fn audit_friend_list(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let audit = app_state.user_service.audit_friend_list(id).await?;
    Ok((StatusCode::OK, Json(audit)))
}
