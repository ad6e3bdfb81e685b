use std::sync::Arc;

use axum::Router;
use utoipa::OpenApi;
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa_scalar::{Scalar, Servable};

use crate::AppState;

pub mod api_models;
pub mod block_handlers;
pub mod friendship_handlers;
pub mod middlewares;
pub mod user_handlers;

#[derive(OpenApi)]
#[openapi(
    tags(
        (name = "users", description = "Users and follows"),
        (name = "friends", description = "Friend requests and friend lists"),
        (name = "blocks", description = "Blocking users")
    )
)]
pub struct ApiDoc;

pub fn setup_routes() -> Router<Arc<AppState>> {
    let api_doc = ApiDoc::openapi();

    let user_router = OpenApiRouter::new()
        .routes(routes!(user_handlers::create_user))
        .routes(routes!(user_handlers::get_user))
        .routes(routes!(user_handlers::get_user_by_username))
        .routes(routes!(user_handlers::toggle_follow))
        .routes(routes!(user_handlers::get_followers))
        .routes(routes!(user_handlers::get_following))
        .routes(routes!(user_handlers::get_relationship))
        .routes(routes!(user_handlers::audit_follow_counts))
        .routes(routes!(user_handlers::reconcile_follow_counts))
        .routes(routes!(user_handlers::audit_friend_list));

    let friend_router = OpenApiRouter::new()
        .routes(routes!(friendship_handlers::list_friends))
        .routes(routes!(friendship_handlers::remove_friend))
        .routes(routes!(friendship_handlers::send_friend_request))
        .routes(routes!(friendship_handlers::list_friend_requests))
        .routes(routes!(friendship_handlers::accept_friend_request))
        .routes(routes!(friendship_handlers::reject_friend_request))
        .routes(routes!(friendship_handlers::cancel_friend_request));

    let block_router = OpenApiRouter::new().routes(routes!(
        block_handlers::block_user,
        block_handlers::unblock_user
    ));

    let user_router = OpenApiRouter::with_openapi(api_doc.clone()).nest("/users", user_router);
    let friend_router =
        OpenApiRouter::with_openapi(api_doc.clone()).nest("/friends", friend_router);
    let block_router = OpenApiRouter::with_openapi(api_doc.clone()).nest("/blocks", block_router);

    let router = OpenApiRouter::new()
        .merge(user_router)
        .merge(friend_router)
        .merge(block_router);

    let (api_router, api_openapi) = OpenApiRouter::new()
        .nest("/api/v1", router)
        .split_for_parts();

    Router::new()
        .merge(Scalar::with_url("/docs", api_openapi))
        .merge(api_router)
}
