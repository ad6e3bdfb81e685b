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
    models::friendships::Friendship,
    utils::errors::{app_error::AppError, error_payload::ErrorPayload},
    AppState,
};

const TAG: &str = "blocks";

/// Block a user
///
/// Removes follows in both directions and any friendship between the users.
#[utoipa::path(
    post,
    tag = TAG,
    path = "/{id}",
    operation_id = "blockUser",
    responses(
        (status = 200, description = "User blocked", body = Friendship),
        (status = 400, description = "Cannot block yourself", body = ErrorPayload),
        (status = 403, description = "The other user already blocked the caller", body = ErrorPayload),
        (status = 404, description = "User not found", body = ErrorPayload),
        (status = 500, description = "Internal server error", body = ErrorPayload)
    ),
    params(
        ("id" = Uuid, Path, description = "User ID to block"),
        ("x-user-id" = Uuid, Header, description = "Acting user")
    )
)]
pub(super) async fn block_user(
    State(app_state): State<Arc<AppState>>,
    ActorId(actor_id): ActorId,
    Path(target_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let friendship = app_state
        .relationship_service
        .block_user(actor_id, target_id)
        .await?;
    Ok((StatusCode::OK, Json(friendship)))
}

/// Unblock a user
#[utoipa::path(
    delete,
    tag = TAG,
    path = "/{id}",
    operation_id = "unblockUser",
    responses(
        (status = 204, description = "User unblocked"),
        (status = 404, description = "No block between the users", body = ErrorPayload),
        (status = 409, description = "The caller did not place this block", body = ErrorPayload),
        (status = 500, description = "Internal server error", body = ErrorPayload)
    ),
    params(
        ("id" = Uuid, Path, description = "User ID to unblock"),
        ("x-user-id" = Uuid, Header, description = "Acting user")
    )
)]
pub(super) async fn unblock_user(
    State(app_state): State<Arc<AppState>>,
    ActorId(actor_id): ActorId,
    Path(target_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    app_state
        .relationship_service
        .unblock_user(actor_id, target_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
