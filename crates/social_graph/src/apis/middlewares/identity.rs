use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::HeaderName, request::Parts},
};
use once_cell::sync::Lazy;
use tracing::warn;
use uuid::Uuid;

use crate::utils::errors::app_error::AppError;

/// Header carrying the authenticated caller's user id, set by the auth proxy.
pub static USER_ID_HEADER: Lazy<HeaderName> = Lazy::new(|| HeaderName::from_static("x-user-id"));

/// The user on whose behalf the request acts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for ActorId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(USER_ID_HEADER.as_str())
            .ok_or_else(|| AppError::Unauthorized("Missing x-user-id header".to_string()))?;

        header
            .to_str()
            .ok()
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .map(ActorId)
            .ok_or_else(|| {
                warn!("Rejected malformed x-user-id header");
                AppError::Unauthorized("Invalid x-user-id header".to_string())
            })
    }
}
