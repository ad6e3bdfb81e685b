use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    models::{
        activity::{ActivityEvent, ActivityKind},
        friendships::{Friendship, FriendshipState, Transition, TransitionOutcome},
        relationships::{FriendRequestOutcome, FriendRequests, FriendResponse, RelationshipStatus},
        user_follows::ToggleFollowResponse,
        users::UserResponse,
    },
    repositories::relationship_repository::{RelationshipStore, RelationshipTx},
    utils::api_errors::ApiError,
};

use super::notification_service::ActivityNotifier;

/// Follow, friendship and block transitions between two users.
///
/// Each operation runs in a single unit of work: the pair's user rows are
/// locked first, then the relationship state is read, validated and written.
/// Follow counters and friend lists change in the same unit as the rows they
/// reflect.
#[derive(Clone)]
pub struct RelationshipService {
    store: Arc<dyn RelationshipStore>,
    notifier: Arc<dyn ActivityNotifier>,
}

fn ensure_distinct(actor_id: Uuid, target_id: Uuid) -> Result<(), ApiError> {
    if actor_id == target_id {
        return Err(ApiError::SelfReference);
    }
    Ok(())
}

async fn lock_pair(tx: &mut dyn RelationshipTx, a: Uuid, b: Uuid) -> Result<(), ApiError> {
    let users = tx.lock_users(a, b).await?;
    for id in [a, b] {
        if !users.iter().any(|u| u.id == id) {
            return Err(ApiError::UserNotFound(id));
        }
    }
    Ok(())
}

/// Loads a friendship by id with both of its users locked.
async fn lock_friendship(tx: &mut dyn RelationshipTx, id: Uuid) -> Result<Friendship, ApiError> {
    let not_found = || ApiError::NotFound(format!("Friend request {} not found", id));

    let friendship = tx.get_friendship(id).await?.ok_or_else(not_found)?;
    lock_pair(tx, friendship.requester_id, friendship.recipient_id).await?;
    // Re-read under the lock; another unit may have changed it meanwhile.
    tx.get_friendship(id).await?.ok_or_else(not_found)
}

/// Runs `transition` through the state table and writes the outcome. Returns
/// `None` when the row was deleted.
async fn apply_transition(
    tx: &mut dyn RelationshipTx,
    friendship: &Friendship,
    transition: Transition,
) -> Result<Option<Friendship>, ApiError> {
    match friendship.transition(transition)? {
        TransitionOutcome::Becomes(state) => Ok(Some(
            tx.update_friendship_status(friendship.id, state).await?,
        )),
        TransitionOutcome::Removed => {
            tx.delete_friendship(friendship.id).await?;
            Ok(None)
        }
    }
}

async fn unlink_friends(tx: &mut dyn RelationshipTx, a: Uuid, b: Uuid) -> Result<(), ApiError> {
    tx.remove_friend(a, b).await?;
    tx.remove_friend(b, a).await?;
    Ok(())
}

impl RelationshipService {
    pub fn new(store: Arc<dyn RelationshipStore>, notifier: Arc<dyn ActivityNotifier>) -> Self {
        Self { store, notifier }
    }

    /// Hands the event to the notifier without waiting for it.
    fn publish(&self, kind: ActivityKind) {
        let notifier = self.notifier.clone();
        let event = ActivityEvent::new(kind);
        tokio::spawn(async move {
            if let Err(e) = notifier.notify(&event).await {
                warn!("Failed to publish activity event {}: {}", event, e);
            }
        });
    }

    #[instrument(skip(self))]
    pub async fn toggle_follow(
        &self,
        actor_id: Uuid,
        target_id: Uuid,
    ) -> Result<ToggleFollowResponse, ApiError> {
        ensure_distinct(actor_id, target_id)?;
        let mut tx = self.store.begin().await?;
        lock_pair(&mut *tx, actor_id, target_id).await?;

        let followed = if tx.get_follow(actor_id, target_id).await?.is_some() {
            tx.delete_follow(actor_id, target_id).await?;
            tx.adjust_follow_counts(actor_id, target_id, -1).await?;
            false
        } else {
            if let Some(friendship) = tx.find_friendship(actor_id, target_id).await? {
                if friendship.state.is_blocked() {
                    return Err(ApiError::Blocked);
                }
            }
            if tx.create_follow(actor_id, target_id).await? {
                tx.adjust_follow_counts(actor_id, target_id, 1).await?;
            } else {
                warn!("Follow edge appeared under lock, counters left untouched");
            }
            true
        };

        let followers_count = tx.follow_counts(target_id).await?.followers_count;
        let following_count = tx.follow_counts(actor_id).await?.following_count;
        tx.commit().await?;

        debug!(followed, followers_count, following_count, "follow toggled");
        if followed {
            self.publish(ActivityKind::Followed {
                follower_id: actor_id,
                followed_id: target_id,
            });
        }

        Ok(ToggleFollowResponse {
            followed,
            followers_count,
            following_count,
        })
    }

    #[instrument(skip(self))]
    pub async fn send_friend_request(
        &self,
        actor_id: Uuid,
        target_id: Uuid,
    ) -> Result<FriendRequestOutcome, ApiError> {
        ensure_distinct(actor_id, target_id)?;
        let mut tx = self.store.begin().await?;
        lock_pair(&mut *tx, actor_id, target_id).await?;

        let outcome = match tx.find_friendship(actor_id, target_id).await? {
            None => FriendRequestOutcome::Sent {
                friendship: tx
                    .create_friendship(actor_id, target_id, FriendshipState::Pending)
                    .await?,
            },
            Some(existing) => match existing.state {
                FriendshipState::Pending if existing.requester_id == actor_id => {
                    FriendRequestOutcome::AlreadyRequested {
                        friendship: existing,
                    }
                }
                FriendshipState::Pending => FriendRequestOutcome::AwaitingResponse {
                    friendship: existing,
                },
                FriendshipState::Accepted => FriendRequestOutcome::AlreadyFriends {
                    friendship: existing,
                },
                FriendshipState::Blocked { .. } => return Err(ApiError::Blocked),
                FriendshipState::Rejected => {
                    // The new request belongs to whoever sends it, so the
                    // rejected row is replaced rather than reopened.
                    let TransitionOutcome::Becomes(state) =
                        existing.transition(Transition::Resend)?
                    else {
                        return Err(ApiError::InternalServerError(
                            "resending a request must keep the row".to_string(),
                        ));
                    };
                    tx.delete_friendship(existing.id).await?;
                    FriendRequestOutcome::Resent {
                        friendship: tx.create_friendship(actor_id, target_id, state).await?,
                    }
                }
            },
        };

        if outcome.created() {
            tx.commit().await?;
            info!("Friend request {} sent", outcome.friendship().id);
            self.publish(ActivityKind::FriendRequestSent {
                requester_id: actor_id,
                recipient_id: target_id,
            });
        }

        Ok(outcome)
    }

    #[instrument(skip(self))]
    pub async fn accept_friend_request(
        &self,
        actor_id: Uuid,
        request_id: Uuid,
    ) -> Result<Friendship, ApiError> {
        let mut tx = self.store.begin().await?;
        let request = lock_friendship(&mut *tx, request_id).await?;
        if request.recipient_id != actor_id {
            return Err(ApiError::Unauthorized(
                "only the recipient can accept a friend request".to_string(),
            ));
        }

        let accepted = apply_transition(&mut *tx, &request, Transition::Accept)
            .await?
            .ok_or_else(|| ApiError::InternalServerError("accepted request vanished".to_string()))?;
        tx.add_friend(request.requester_id, request.recipient_id)
            .await?;
        tx.add_friend(request.recipient_id, request.requester_id)
            .await?;
        tx.commit().await?;

        info!("Friend request {} accepted", request_id);
        self.publish(ActivityKind::FriendRequestAccepted {
            requester_id: request.requester_id,
            recipient_id: request.recipient_id,
        });

        Ok(accepted)
    }

    #[instrument(skip(self))]
    pub async fn reject_friend_request(
        &self,
        actor_id: Uuid,
        request_id: Uuid,
    ) -> Result<Friendship, ApiError> {
        let mut tx = self.store.begin().await?;
        let request = lock_friendship(&mut *tx, request_id).await?;
        if request.recipient_id != actor_id {
            return Err(ApiError::Unauthorized(
                "only the recipient can reject a friend request".to_string(),
            ));
        }

        let rejected = apply_transition(&mut *tx, &request, Transition::Reject)
            .await?
            .ok_or_else(|| ApiError::InternalServerError("rejected request vanished".to_string()))?;
        tx.commit().await?;

        Ok(rejected)
    }

    #[instrument(skip(self))]
    pub async fn cancel_friend_request(
        &self,
        actor_id: Uuid,
        request_id: Uuid,
    ) -> Result<(), ApiError> {
        let mut tx = self.store.begin().await?;
        let request = lock_friendship(&mut *tx, request_id).await?;
        if request.requester_id != actor_id {
            return Err(ApiError::Unauthorized(
                "only the sender can cancel a friend request".to_string(),
            ));
        }

        apply_transition(&mut *tx, &request, Transition::Cancel).await?;
        tx.commit().await?;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn remove_friend(&self, actor_id: Uuid, target_id: Uuid) -> Result<(), ApiError> {
        ensure_distinct(actor_id, target_id)?;
        let mut tx = self.store.begin().await?;
        lock_pair(&mut *tx, actor_id, target_id).await?;

        let friendship = tx
            .find_friendship(actor_id, target_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("No friendship with {}", target_id)))?;
        apply_transition(&mut *tx, &friendship, Transition::Unfriend).await?;
        unlink_friends(&mut *tx, actor_id, target_id).await?;
        tx.commit().await?;

        Ok(())
    }

    /// Blocks `target_id` on behalf of `actor_id` and tears down every follow
    /// edge and friend-list entry between them, all in one unit of work. A block
    /// already placed by `target_id` is overwritten with `actor_id` as blocker.
    #[instrument(skip(self))]
    pub async fn block_user(&self, actor_id: Uuid, target_id: Uuid) -> Result<Friendship, ApiError> {
        ensure_distinct(actor_id, target_id)?;
        let mut tx = self.store.begin().await?;
        lock_pair(&mut *tx, actor_id, target_id).await?;

        let blocked = FriendshipState::Blocked {
            blocked_by: actor_id,
        };
        let friendship = match tx.find_friendship(actor_id, target_id).await? {
            Some(existing) if existing.state == blocked => existing,
            Some(existing) => {
                apply_transition(&mut *tx, &existing, Transition::Block { by: actor_id })
                    .await?
                    .ok_or_else(|| {
                        ApiError::InternalServerError("blocked friendship vanished".to_string())
                    })?
            }
            None => tx.create_friendship(actor_id, target_id, blocked).await?,
        };

        for (follower_id, followed_id) in [(actor_id, target_id), (target_id, actor_id)] {
            if tx.delete_follow(follower_id, followed_id).await? {
                tx.adjust_follow_counts(follower_id, followed_id, -1).await?;
            }
        }
        unlink_friends(&mut *tx, actor_id, target_id).await?;
        tx.commit().await?;

        info!("User {} blocked {}", actor_id, target_id);
        Ok(friendship)
    }

    #[instrument(skip(self))]
    pub async fn unblock_user(&self, actor_id: Uuid, target_id: Uuid) -> Result<(), ApiError> {
        ensure_distinct(actor_id, target_id)?;
        let mut tx = self.store.begin().await?;
        lock_pair(&mut *tx, actor_id, target_id).await?;

        let friendship = tx
            .find_friendship(actor_id, target_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("No block between you and {}", target_id)))?;
        if let Some(blocked_by) = friendship.state.blocked_by() {
            if blocked_by != actor_id {
                return Err(ApiError::InvalidState(
                    "only the user who placed the block can lift it".to_string(),
                ));
            }
        }
        apply_transition(&mut *tx, &friendship, Transition::Unblock).await?;
        tx.commit().await?;

        info!("User {} unblocked {}", actor_id, target_id);
        Ok(())
    }

    pub async fn list_friends(&self, user_id: Uuid) -> Result<Vec<FriendResponse>, ApiError> {
        let friends = self.store.list_friends(user_id).await?;

        let mut response = Vec::with_capacity(friends.len());
        for friend in friends {
            let Some(friendship) = self.store.find_friendship(user_id, friend.id).await? else {
                warn!(
                    "Friend list of {} lists {} without a friendship row",
                    user_id, friend.id
                );
                continue;
            };
            let is_following = self.store.is_following(user_id, friend.id).await?;
            response.push(FriendResponse {
                user: UserResponse::from(friend),
                friendship,
                is_following,
            });
        }

        Ok(response)
    }

    pub async fn list_friend_requests(&self, user_id: Uuid) -> Result<FriendRequests, ApiError> {
        self.store.list_pending_requests(user_id).await
    }

    /// Both axes of the relationship between two users, seen from `actor_id`.
    pub async fn relationship_between(
        &self,
        actor_id: Uuid,
        target_id: Uuid,
    ) -> Result<RelationshipStatus, ApiError> {
        ensure_distinct(actor_id, target_id)?;
        if self.store.find_user(target_id).await?.is_none() {
            return Err(ApiError::UserNotFound(target_id));
        }

        let friendship = self.store.find_friendship(actor_id, target_id).await?;
        let (friends, blocked) = match &friendship {
            Some(f) => (f.state == FriendshipState::Accepted, f.state.is_blocked()),
            None => (false, false),
        };

        Ok(RelationshipStatus {
            user_id: target_id,
            following: self.store.is_following(actor_id, target_id).await?,
            followed_by: self.store.is_following(target_id, actor_id).await?,
            friends,
            blocked,
            friendship,
        })
    }
}
