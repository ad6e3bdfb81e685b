use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    models::{
        friend_lists::FriendList,
        friendships::{Friendship, FriendshipState},
        relationships::FriendRequests,
        user_follows::{FollowCounts, UserFollow},
        users::User,
    },
    utils::api_errors::ApiError,
};

/// Persistence contract for users, follow edges, friendship rows and friend
/// lists.
///
/// Reads that do not feed a state transition go straight to the store. Every
/// write goes through a [`RelationshipTx`] obtained from [`begin`], so an
/// operation touching several records lands all of its writes or none.
///
/// [`begin`]: RelationshipStore::begin
#[async_trait]
pub trait RelationshipStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn RelationshipTx>, ApiError>;

    /// Inserts the user together with their empty friend list.
    async fn create_user(&self, user: &User) -> Result<User, ApiError>;

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, ApiError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, ApiError>;

    async fn is_following(&self, follower_id: Uuid, followed_id: Uuid) -> Result<bool, ApiError>;

    async fn list_followers(&self, user_id: Uuid) -> Result<Vec<User>, ApiError>;

    async fn list_following(&self, user_id: Uuid) -> Result<Vec<User>, ApiError>;

    /// Users in the friend list of `user_id`, most recently added first.
    async fn list_friends(&self, user_id: Uuid) -> Result<Vec<User>, ApiError>;

    async fn list_pending_requests(&self, user_id: Uuid) -> Result<FriendRequests, ApiError>;

    async fn find_friendship(&self, a: Uuid, b: Uuid) -> Result<Option<Friendship>, ApiError>;

    async fn get_friendship(&self, id: Uuid) -> Result<Option<Friendship>, ApiError>;
}

/// A unit of work over the store. Dropping it without calling
/// [`commit`](RelationshipTx::commit) discards every write made through it.
#[async_trait]
pub trait RelationshipTx: Send {
    /// Locks both user rows for the rest of the unit and returns the ones
    /// that exist. Concurrent units touching the same pair wait here.
    async fn lock_users(&mut self, a: Uuid, b: Uuid) -> Result<Vec<User>, ApiError>;

    async fn find_user(&mut self, id: Uuid) -> Result<Option<User>, ApiError>;

    async fn get_follow(
        &mut self,
        follower_id: Uuid,
        followed_id: Uuid,
    ) -> Result<Option<UserFollow>, ApiError>;

    /// Returns false when the edge already existed.
    async fn create_follow(&mut self, follower_id: Uuid, followed_id: Uuid)
        -> Result<bool, ApiError>;

    /// Returns false when there was no edge to delete.
    async fn delete_follow(&mut self, follower_id: Uuid, followed_id: Uuid)
        -> Result<bool, ApiError>;

    /// Moves `follower.following_count` and `followed.followers_count` by
    /// `delta`. Fails with [`ApiError::CounterDrift`] instead of letting a
    /// counter go negative.
    async fn adjust_follow_counts(
        &mut self,
        follower_id: Uuid,
        followed_id: Uuid,
        delta: i32,
    ) -> Result<(), ApiError>;

    async fn follow_counts(&mut self, user_id: Uuid) -> Result<FollowCounts, ApiError>;

    /// Counts follow edges, ignoring the stored counters.
    async fn recount_follows(&mut self, user_id: Uuid) -> Result<FollowCounts, ApiError>;

    async fn set_follow_counts(&mut self, user_id: Uuid, counts: FollowCounts)
        -> Result<(), ApiError>;

    /// Direction-agnostic lookup of the pair's friendship row.
    async fn find_friendship(&mut self, a: Uuid, b: Uuid) -> Result<Option<Friendship>, ApiError>;

    async fn get_friendship(&mut self, id: Uuid) -> Result<Option<Friendship>, ApiError>;

    async fn create_friendship(
        &mut self,
        requester_id: Uuid,
        recipient_id: Uuid,
        state: FriendshipState,
    ) -> Result<Friendship, ApiError>;

    async fn update_friendship_status(
        &mut self,
        id: Uuid,
        state: FriendshipState,
    ) -> Result<Friendship, ApiError>;

    async fn delete_friendship(&mut self, id: Uuid) -> Result<bool, ApiError>;

    async fn friend_list_for(&mut self, user_id: Uuid) -> Result<FriendList, ApiError>;

    /// Returns false when `friend_id` was already listed.
    async fn add_friend(&mut self, owner_id: Uuid, friend_id: Uuid) -> Result<bool, ApiError>;

    /// Returns false when `friend_id` was not listed.
    async fn remove_friend(&mut self, owner_id: Uuid, friend_id: Uuid) -> Result<bool, ApiError>;

    async fn is_friend(&mut self, owner_id: Uuid, friend_id: Uuid) -> Result<bool, ApiError>;

    async fn commit(self: Box<Self>) -> Result<(), ApiError>;
}
