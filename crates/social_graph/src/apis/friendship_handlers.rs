use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{
    apis::middlewares::identity::ActorId,
    models::{
        friendships::Friendship,
        relationships::{FriendRequestOutcome, FriendRequests, FriendResponse},
    },
    utils::errors::{app_error::AppError, error_payload::ErrorPayload},
    AppState,
};

const TAG: &str = "friends";

/// List the caller's friends
#[utoipa::path(
    get,
    tag = TAG,
    path = "/",
    operation_id = "listFriends",
    responses(
        (status = 200, description = "Confirmed friends", body = Vec<FriendResponse>),
        (status = 401, description = "Missing caller identity", body = ErrorPayload),
        (status = 500, description = "Internal server error", body = ErrorPayload)
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "Acting user")
    )
)]
pub(super) async fn list_friends(
    State(app_state): State<Arc<AppState>>,
    ActorId(actor_id): ActorId,
) -> Result<impl IntoResponse, AppError> {
    let friends = app_state.relationship_service.list_friends(actor_id).await?;
    Ok((StatusCode::OK, Json(friends)))
}

/// Remove a friend
#[utoipa::path(
    delete,
    tag = TAG,
    path = "/{id}",
    operation_id = "removeFriend",
    responses(
        (status = 204, description = "Friendship removed"),
        (status = 404, description = "No friendship with this user", body = ErrorPayload),
        (status = 409, description = "The users are not friends", body = ErrorPayload),
        (status = 500, description = "Internal server error", body = ErrorPayload)
    ),
    params(
        ("id" = Uuid, Path, description = "Friend's user ID"),
        ("x-user-id" = Uuid, Header, description = "Acting user")
    )
)]
pub(super) async fn remove_friend(
    State(app_state): State<Arc<AppState>>,
    ActorId(actor_id): ActorId,
    Path(friend_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    app_state
        .relationship_service
        .remove_friend(actor_id, friend_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Send a friend request
#[utoipa::path(
    post,
    tag = TAG,
    path = "/{id}/request",
    operation_id = "sendFriendRequest",
    responses(
        (status = 200, description = "What happened to the request", body = FriendRequestOutcome),
        (status = 400, description = "Cannot befriend yourself", body = ErrorPayload),
        (status = 403, description = "One of the users blocked the other", body = ErrorPayload),
        (status = 404, description = "User not found", body = ErrorPayload),
        (status = 500, description = "Internal server error", body = ErrorPayload)
    ),
    params(
        ("id" = Uuid, Path, description = "User ID to befriend"),
        ("x-user-id" = Uuid, Header, description = "Acting user")
    )
)]
pub(super) async fn send_friend_request(
    State(app_state): State<Arc<AppState>>,
    ActorId(actor_id): ActorId,
    Path(target_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = app_state
        .relationship_service
        .send_friend_request(actor_id, target_id)
        .await?;
    Ok((StatusCode::OK, Json(outcome)))
}

/// List pending friend requests
#[utoipa::path(
    get,
    tag = TAG,
    path = "/requests",
    operation_id = "listFriendRequests",
    responses(
        (status = 200, description = "Incoming and outgoing pending requests", body = FriendRequests),
        (status = 401, description = "Missing caller identity", body = ErrorPayload),
        (status = 500, description = "Internal server error", body = ErrorPayload)
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "Acting user")
    )
)]
pub(super) async fn list_friend_requests(
    State(app_state): State<Arc<AppState>>,
    ActorId(actor_id): ActorId,
) -> Result<impl IntoResponse, AppError> {
    let requests = app_state
        .relationship_service
        .list_friend_requests(actor_id)
        .await?;
    Ok((StatusCode::OK, Json(requests)))
}

/// Accept a friend request
#[utoipa::path(
    post,
    tag = TAG,
    path = "/requests/{id}/accept",
    operation_id = "acceptFriendRequest",
    responses(
        (status = 200, description = "Request accepted", body = Friendship),
        (status = 403, description = "Caller is not the recipient", body = ErrorPayload),
        (status = 404, description = "Request not found", body = ErrorPayload),
        (status = 409, description = "Request is not pending", body = ErrorPayload),
        (status = 500, description = "Internal server error", body = ErrorPayload)
    ),
    params(
        ("id" = Uuid, Path, description = "Friend request ID"),
        ("x-user-id" = Uuid, Header, description = "Acting user")
    )
)]
pub(super) async fn accept_friend_request(
    State(app_state): State<Arc<AppState>>,
    ActorId(actor_id): ActorId,
    Path(request_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let friendship = app_state
        .relationship_service
        .accept_friend_request(actor_id, request_id)
        .await?;
    Ok((StatusCode::OK, Json(friendship)))
}

/// Reject a friend request
#[utoipa::path(
    post,
    tag = TAG,
    path = "/requests/{id}/reject",
    operation_id = "rejectFriendRequest",
    responses(
        (status = 200, description = "Request rejected", body = Friendship),
        (status = 403, description = "Caller is not the recipient", body = ErrorPayload),
        (status = 404, description = "Request not found", body = ErrorPayload),
        (status = 409, description = "Request is not pending", body = ErrorPayload),
        (status = 500, description = "Internal server error", body = ErrorPayload)
    ),
    params(
        ("id" = Uuid, Path, description = "Friend request ID"),
        ("x-user-id" = Uuid, Header, description = "Acting user")
    )
)]
pub(super) async fn reject_friend_request(
    State(app_state): State<Arc<AppState>>,
    ActorId(actor_id): ActorId,
    Path(request_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let friendship = app_state
        .relationship_service
        .reject_friend_request(actor_id, request_id)
        .await?;
    Ok((StatusCode::OK, Json(friendship)))
}

/// Cancel a sent friend request
#[utoipa::path(
    delete,
    tag = TAG,
    path = "/requests/{id}",
    operation_id = "cancelFriendRequest",
    responses(
        (status = 204, description = "Request cancelled"),
        (status = 403, description = "Caller is not the sender", body = ErrorPayload),
        (status = 404, description = "Request not found", body = ErrorPayload),
        (status = 409, description = "Request is not pending", body = ErrorPayload),
        (status = 500, description = "Internal server error", body = ErrorPayload)
    ),
    params(
        ("id" = Uuid, Path, description = "Friend request ID"),
        ("x-user-id" = Uuid, Header, description = "Acting user")
    )
)]
pub(super) async fn cancel_friend_request(
    State(app_state): State<Arc<AppState>>,
    ActorId(actor_id): ActorId,
    Path(request_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    app_state
        .relationship_service
        .cancel_friend_request(actor_id, request_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
