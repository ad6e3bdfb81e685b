use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, FromRow, Serialize, Deserialize)]
pub struct UserFollow {
    pub follower_id: Uuid,
    pub followed_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl UserFollow {
    pub fn new(follower_id: Uuid, followed_id: Uuid) -> Self {
        Self {
            follower_id,
            followed_id,
            created_at: Utc::now(),
        }
    }
}

/// The denormalized follow counters of a single user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, FromRow, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FollowCounts {
    /// Number of users following this user.
    pub followers_count: i32,
    /// Number of users this user follows.
    pub following_count: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ToggleFollowResponse {
    /// Whether the actor follows the target after the toggle.
    pub followed: bool,
    /// The target's refreshed follower count.
    pub followers_count: i32,
    /// The actor's refreshed following count.
    pub following_count: i32,
}

/// Stored counters next to the values recounted from follow edges.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FollowCountAudit {
    pub user_id: Uuid,
    pub stored: FollowCounts,
    pub actual: FollowCounts,
}

impl FollowCountAudit {
    pub fn has_drift(&self) -> bool {
        self.stored != self.actual
    }
}
