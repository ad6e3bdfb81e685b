use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{friendships::Friendship, users::UserResponse};

/// Result of asking to befriend someone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum FriendRequestOutcome {
    /// A new pending request was created.
    Sent { friendship: Friendship },
    /// A previously rejected request was replaced by a new pending one.
    Resent { friendship: Friendship },
    /// The actor already has a pending request to the target.
    AlreadyRequested { friendship: Friendship },
    /// The target already sent the actor a request that is waiting for an answer.
    AwaitingResponse { friendship: Friendship },
    AlreadyFriends { friendship: Friendship },
}

impl FriendRequestOutcome {
    pub fn friendship(&self) -> &Friendship {
        match self {
            FriendRequestOutcome::Sent { friendship }
            | FriendRequestOutcome::Resent { friendship }
            | FriendRequestOutcome::AlreadyRequested { friendship }
            | FriendRequestOutcome::AwaitingResponse { friendship }
            | FriendRequestOutcome::AlreadyFriends { friendship } => friendship,
        }
    }

    pub fn created(&self) -> bool {
        matches!(
            self,
            FriendRequestOutcome::Sent { .. } | FriendRequestOutcome::Resent { .. }
        )
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequests {
    /// Pending requests where the user is the recipient.
    pub incoming: Vec<Friendship>,
    /// Pending requests the user sent.
    pub outgoing: Vec<Friendship>,
}

/// How the actor relates to another user, across both axes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipStatus {
    pub user_id: Uuid,
    pub following: bool,
    pub followed_by: bool,
    pub friends: bool,
    pub blocked: bool,
    pub friendship: Option<Friendship>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FriendResponse {
    pub user: UserResponse,
    pub friendship: Friendship,
    /// Whether the listing user also follows this friend.
    pub is_following: bool,
}
