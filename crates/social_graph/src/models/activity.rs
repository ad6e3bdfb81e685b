use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "type")]
pub enum ActivityKind {
    Followed { follower_id: Uuid, followed_id: Uuid },
    FriendRequestSent { requester_id: Uuid, recipient_id: Uuid },
    FriendRequestAccepted { requester_id: Uuid, recipient_id: Uuid },
}

impl ActivityKind {
    /// The user who should hear about the event.
    pub fn recipient(&self) -> Uuid {
        match self {
            ActivityKind::Followed { followed_id, .. } => *followed_id,
            ActivityKind::FriendRequestSent { recipient_id, .. } => *recipient_id,
            ActivityKind::FriendRequestAccepted { requester_id, .. } => *requester_id,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    pub event_date: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: ActivityKind,
}

impl ActivityEvent {
    pub fn new(kind: ActivityKind) -> Self {
        Self {
            event_date: Utc::now(),
            kind,
        }
    }
}

impl Display for ActivityEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ActivityKind::Followed {
                follower_id,
                followed_id,
            } => write!(f, "{} followed {}", follower_id, followed_id),
            ActivityKind::FriendRequestSent {
                requester_id,
                recipient_id,
            } => write!(f, "{} sent a friend request to {}", requester_id, recipient_id),
            ActivityKind::FriendRequestAccepted {
                requester_id,
                recipient_id,
            } => write!(
                f,
                "{} accepted the friend request from {}",
                recipient_id, requester_id
            ),
        }
    }
}
