use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::utils::api_errors::ApiError;

/// Lifecycle state of the single friendship row shared by a pair of users.
///
/// A row in `Blocked` carries the user who placed the block, since only that
/// user may lift it. Either party may block at any time; the latest block wins.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum FriendshipState {
    Pending,
    Accepted,
    Rejected,
    Blocked {
        #[serde(rename = "blockedBy")]
        blocked_by: Uuid,
    },
}

/// A state change requested on an existing friendship row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Accept,
    Reject,
    Cancel,
    Unfriend,
    Resend,
    Block { by: Uuid },
    Unblock,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The row stays, in the given state.
    Becomes(FriendshipState),
    /// The row is deleted and the pair returns to having no relationship.
    Removed,
}

impl FriendshipState {
    /// The allowed-transition table. `None` means the transition is illegal
    /// from this state.
    pub fn apply(self, transition: Transition) -> Option<TransitionOutcome> {
        use FriendshipState::*;
        use Transition::*;
        use TransitionOutcome::*;

        match (self, transition) {
            (Pending, Accept) => Some(Becomes(Accepted)),
            (Pending, Reject) => Some(Becomes(Rejected)),
            (Pending, Cancel) => Some(Removed),
            (Accepted, Unfriend) => Some(Removed),
            (Rejected, Resend) => Some(Becomes(Pending)),
            (Blocked { .. }, Unblock) => Some(Removed),
            (_, Block { by }) => Some(Becomes(Blocked { blocked_by: by })),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FriendshipState::Pending => "pending",
            FriendshipState::Accepted => "accepted",
            FriendshipState::Rejected => "rejected",
            FriendshipState::Blocked { .. } => "blocked",
        }
    }

    pub fn blocked_by(&self) -> Option<Uuid> {
        match self {
            FriendshipState::Blocked { blocked_by } => Some(*blocked_by),
            _ => None,
        }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, FriendshipState::Blocked { .. })
    }
}

impl Display for FriendshipState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Display for Transition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Transition::Accept => "accept",
            Transition::Reject => "reject",
            Transition::Cancel => "cancel",
            Transition::Unfriend => "unfriend",
            Transition::Resend => "resend",
            Transition::Block { .. } => "block",
            Transition::Unblock => "unblock",
        };
        write!(f, "{}", name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Friendship {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub recipient_id: Uuid,
    #[serde(flatten)]
    pub state: FriendshipState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Friendship {
    pub fn new(requester_id: Uuid, recipient_id: Uuid, state: FriendshipState) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            requester_id,
            recipient_id,
            state,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn involves(&self, user_id: Uuid) -> bool {
        self.requester_id == user_id || self.recipient_id == user_id
    }

    /// True when the row links exactly the two given users, in either direction.
    pub fn connects(&self, a: Uuid, b: Uuid) -> bool {
        (self.requester_id == a && self.recipient_id == b)
            || (self.requester_id == b && self.recipient_id == a)
    }

    /// Checks the transition against the table and returns its outcome.
    pub fn transition(&self, transition: Transition) -> Result<TransitionOutcome, ApiError> {
        self.state.apply(transition).ok_or_else(|| {
            ApiError::InvalidState(format!(
                "cannot {} a friendship that is {}",
                transition, self.state
            ))
        })
    }
}

/// Flat database row of `social.friendships`.
#[derive(Clone, Debug, FromRow)]
pub struct FriendshipRow {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub recipient_id: Uuid,
    pub status: String,
    pub blocked_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<FriendshipRow> for Friendship {
    type Error = ApiError;

    fn try_from(row: FriendshipRow) -> Result<Self, Self::Error> {
        let state = match (row.status.as_str(), row.blocked_by) {
            ("pending", None) => FriendshipState::Pending,
            ("accepted", None) => FriendshipState::Accepted,
            ("rejected", None) => FriendshipState::Rejected,
            ("blocked", Some(blocked_by)) => FriendshipState::Blocked { blocked_by },
            (status, blocked_by) => {
                return Err(ApiError::InternalServerError(format!(
                    "friendship {} has inconsistent status {} (blocked_by {:?})",
                    row.id, status, blocked_by
                )))
            }
        };

        Ok(Friendship {
            id: row.id,
            requester_id: row.requester_id,
            recipient_id: row.recipient_id,
            state,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(FriendshipState::Pending, Transition::Accept, Some(TransitionOutcome::Becomes(FriendshipState::Accepted)))]
    #[case(FriendshipState::Pending, Transition::Reject, Some(TransitionOutcome::Becomes(FriendshipState::Rejected)))]
    #[case(FriendshipState::Pending, Transition::Cancel, Some(TransitionOutcome::Removed))]
    #[case(FriendshipState::Pending, Transition::Unfriend, None)]
    #[case(FriendshipState::Accepted, Transition::Accept, None)]
    #[case(FriendshipState::Accepted, Transition::Cancel, None)]
    #[case(FriendshipState::Accepted, Transition::Unfriend, Some(TransitionOutcome::Removed))]
    #[case(FriendshipState::Rejected, Transition::Accept, None)]
    #[case(FriendshipState::Rejected, Transition::Resend, Some(TransitionOutcome::Becomes(FriendshipState::Pending)))]
    #[case(FriendshipState::Pending, Transition::Unblock, None)]
    fn transition_table(
        #[case] from: FriendshipState,
        #[case] transition: Transition,
        #[case] expected: Option<TransitionOutcome>,
    ) {
        assert_eq!(from.apply(transition), expected);
    }

    #[test]
    fn block_overrides_every_unblocked_state() {
        let by = Uuid::new_v4();
        for from in [
            FriendshipState::Pending,
            FriendshipState::Accepted,
            FriendshipState::Rejected,
        ] {
            assert_eq!(
                from.apply(Transition::Block { by }),
                Some(TransitionOutcome::Becomes(FriendshipState::Blocked {
                    blocked_by: by
                }))
            );
        }
    }

    #[test]
    fn blocked_only_leaves_through_unblock() {
        let state = FriendshipState::Blocked {
            blocked_by: Uuid::new_v4(),
        };
        assert_eq!(
            state.apply(Transition::Unblock),
            Some(TransitionOutcome::Removed)
        );
        for transition in [
            Transition::Accept,
            Transition::Reject,
            Transition::Cancel,
            Transition::Unfriend,
            Transition::Resend,
        ] {
            assert_eq!(state.apply(transition), None);
        }
    }

    #[test]
    fn counter_block_replaces_the_blocker() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let state = FriendshipState::Blocked { blocked_by: first };
        assert_eq!(
            state.apply(Transition::Block { by: second }),
            Some(TransitionOutcome::Becomes(FriendshipState::Blocked {
                blocked_by: second
            }))
        );
    }

    #[test]
    fn row_with_blocked_status_needs_a_blocker() {
        let row = FriendshipRow {
            id: Uuid::new_v4(),
            requester_id: Uuid::new_v4(),
            recipient_id: Uuid::new_v4(),
            status: "blocked".to_string(),
            blocked_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(Friendship::try_from(row).is_err());
    }

    #[test]
    fn friendship_serializes_state_inline() {
        let blocker = Uuid::new_v4();
        let friendship = Friendship::new(
            blocker,
            Uuid::new_v4(),
            FriendshipState::Blocked {
                blocked_by: blocker,
            },
        );
        let json = serde_json::to_value(&friendship).unwrap();
        assert_eq!(json["status"], "blocked");
        assert_eq!(json["blockedBy"], blocker.to_string());
        assert_eq!(json["requesterId"], blocker.to_string());
    }
}
