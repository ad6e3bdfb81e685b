use serde::Serialize;
use utoipa::ToSchema;

use crate::models::users::UserResponse;

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserListResponse {
    pub items: Vec<UserResponse>,
    pub total: usize,
}

impl From<Vec<UserResponse>> for UserListResponse {
    fn from(items: Vec<UserResponse>) -> Self {
        UserListResponse {
            total: items.len(),
            items,
        }
    }
}
