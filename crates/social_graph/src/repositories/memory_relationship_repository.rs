use async_trait::async_trait;
use chrono::Utc;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
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

use super::relationship_repository::{RelationshipStore, RelationshipTx};

#[derive(Clone, Debug, Default)]
struct GraphState {
    users: HashMap<Uuid, User>,
    follows: HashMap<(Uuid, Uuid), UserFollow>,
    friendships: HashMap<Uuid, Friendship>,
    /// Friend ids per owner, in the order they were added.
    friend_lists: HashMap<Uuid, Vec<Uuid>>,
}

impl GraphState {
    fn user(&self, id: Uuid) -> Result<&User, ApiError> {
        self.users.get(&id).ok_or(ApiError::UserNotFound(id))
    }

    fn user_mut(&mut self, id: Uuid) -> Result<&mut User, ApiError> {
        self.users.get_mut(&id).ok_or(ApiError::UserNotFound(id))
    }

    fn friendship_between(&self, a: Uuid, b: Uuid) -> Option<&Friendship> {
        self.friendships.values().find(|f| f.connects(a, b))
    }

    fn users_by_recency<'a>(
        &self,
        edges: impl Iterator<Item = &'a UserFollow>,
        pick: fn(&UserFollow) -> Uuid,
    ) -> Vec<User> {
        let mut edges: Vec<&UserFollow> = edges.collect();
        edges.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        edges
            .into_iter()
            .filter_map(|edge| self.users.get(&pick(edge)).cloned())
            .collect()
    }
}

/// Keeps the whole graph behind one async mutex. A unit of work holds the lock
/// for its lifetime, so units are serialized and an uncommitted unit is undone
/// before the next one can see the graph.
#[derive(Clone, Default)]
pub struct InMemoryRelationshipRepository {
    state: Arc<Mutex<GraphState>>,
}

impl InMemoryRelationshipRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RelationshipStore for InMemoryRelationshipRepository {
    async fn begin(&self) -> Result<Box<dyn RelationshipTx>, ApiError> {
        let state = self.state.clone().lock_owned().await;
        Ok(Box::new(InMemoryRelationshipTx {
            state,
            undo: Vec::new(),
        }))
    }

    async fn create_user(&self, user: &User) -> Result<User, ApiError> {
        let mut state = self.state.lock().await;
        if state.users.values().any(|u| u.username == user.username) {
            return Err(ApiError::InvalidState(format!(
                "username {} is taken",
                user.username
            )));
        }
        if state.users.contains_key(&user.id) {
            return Err(ApiError::InvalidState(format!("user {} exists", user.id)));
        }

        let created = User {
            followers_count: 0,
            following_count: 0,
            ..user.clone()
        };
        state.users.insert(created.id, created.clone());
        state.friend_lists.insert(created.id, Vec::new());
        Ok(created)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, ApiError> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, ApiError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn is_following(&self, follower_id: Uuid, followed_id: Uuid) -> Result<bool, ApiError> {
        let state = self.state.lock().await;
        Ok(state.follows.contains_key(&(follower_id, followed_id)))
    }

    async fn list_followers(&self, user_id: Uuid) -> Result<Vec<User>, ApiError> {
        let state = self.state.lock().await;
        Ok(state.users_by_recency(
            state.follows.values().filter(|f| f.followed_id == user_id),
            |f| f.follower_id,
        ))
    }

    async fn list_following(&self, user_id: Uuid) -> Result<Vec<User>, ApiError> {
        let state = self.state.lock().await;
        Ok(state.users_by_recency(
            state.follows.values().filter(|f| f.follower_id == user_id),
            |f| f.followed_id,
        ))
    }

    async fn list_friends(&self, user_id: Uuid) -> Result<Vec<User>, ApiError> {
        let state = self.state.lock().await;
        let friends = state
            .friend_lists
            .get(&user_id)
            .map(|ids| {
                ids.iter()
                    .rev()
                    .filter_map(|id| state.users.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();
        Ok(friends)
    }

    async fn list_pending_requests(&self, user_id: Uuid) -> Result<FriendRequests, ApiError> {
        let state = self.state.lock().await;
        let mut pending: Vec<&Friendship> = state
            .friendships
            .values()
            .filter(|f| f.state == FriendshipState::Pending && f.involves(user_id))
            .collect();
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let (incoming, outgoing) = pending
            .into_iter()
            .cloned()
            .partition(|f| f.recipient_id == user_id);
        Ok(FriendRequests { incoming, outgoing })
    }

    async fn find_friendship(&self, a: Uuid, b: Uuid) -> Result<Option<Friendship>, ApiError> {
        Ok(self.state.lock().await.friendship_between(a, b).cloned())
    }

    async fn get_friendship(&self, id: Uuid) -> Result<Option<Friendship>, ApiError> {
        Ok(self.state.lock().await.friendships.get(&id).cloned())
    }
}

/// Prior value of one key written by a unit of work.
enum Undo {
    User(User),
    Follow((Uuid, Uuid), Option<UserFollow>),
    Friendship(Uuid, Option<Friendship>),
    FriendList(Uuid, Vec<Uuid>),
}

impl Undo {
    fn restore(self, state: &mut GraphState) {
        match self {
            Undo::User(user) => {
                state.users.insert(user.id, user);
            }
            Undo::Follow(key, Some(follow)) => {
                state.follows.insert(key, follow);
            }
            Undo::Follow(key, None) => {
                state.follows.remove(&key);
            }
            Undo::Friendship(id, Some(friendship)) => {
                state.friendships.insert(id, friendship);
            }
            Undo::Friendship(id, None) => {
                state.friendships.remove(&id);
            }
            Undo::FriendList(owner_id, friends) => {
                state.friend_lists.insert(owner_id, friends);
            }
        }
    }
}

/// Writes straight into the locked graph and logs the prior value of every
/// key it touches. Dropping the unit without `commit` replays the log backwards.
pub struct InMemoryRelationshipTx {
    state: OwnedMutexGuard<GraphState>,
    undo: Vec<Undo>,
}

impl InMemoryRelationshipTx {
    fn save_user(&mut self, id: Uuid) -> Result<(), ApiError> {
        let prior = self.state.user(id)?.clone();
        self.undo.push(Undo::User(prior));
        Ok(())
    }

    fn save_friend_list(&mut self, owner_id: Uuid) -> Result<(), ApiError> {
        let prior = self
            .state
            .friend_lists
            .get(&owner_id)
            .cloned()
            .ok_or(ApiError::UserNotFound(owner_id))?;
        self.undo.push(Undo::FriendList(owner_id, prior));
        Ok(())
    }
}

impl Drop for InMemoryRelationshipTx {
    fn drop(&mut self) {
        while let Some(entry) = self.undo.pop() {
            entry.restore(&mut self.state);
        }
    }
}

#[async_trait]
impl RelationshipTx for InMemoryRelationshipTx {
    async fn lock_users(&mut self, a: Uuid, b: Uuid) -> Result<Vec<User>, ApiError> {
        // The whole store is already locked by this unit.
        let mut users: Vec<User> = [a, b]
            .into_iter()
            .collect::<HashSet<_>>()
            .into_iter()
            .filter_map(|id| self.state.users.get(&id).cloned())
            .collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn find_user(&mut self, id: Uuid) -> Result<Option<User>, ApiError> {
        Ok(self.state.users.get(&id).cloned())
    }

    async fn get_follow(
        &mut self,
        follower_id: Uuid,
        followed_id: Uuid,
    ) -> Result<Option<UserFollow>, ApiError> {
        Ok(self.state.follows.get(&(follower_id, followed_id)).cloned())
    }

    async fn create_follow(
        &mut self,
        follower_id: Uuid,
        followed_id: Uuid,
    ) -> Result<bool, ApiError> {
        self.state.user(follower_id)?;
        self.state.user(followed_id)?;

        let key = (follower_id, followed_id);
        if self.state.follows.contains_key(&key) {
            return Ok(false);
        }
        self.state
            .follows
            .insert(key, UserFollow::new(follower_id, followed_id));
        self.undo.push(Undo::Follow(key, None));
        Ok(true)
    }

    async fn delete_follow(
        &mut self,
        follower_id: Uuid,
        followed_id: Uuid,
    ) -> Result<bool, ApiError> {
        let key = (follower_id, followed_id);
        match self.state.follows.remove(&key) {
            Some(prior) => {
                self.undo.push(Undo::Follow(key, Some(prior)));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn adjust_follow_counts(
        &mut self,
        follower_id: Uuid,
        followed_id: Uuid,
        delta: i32,
    ) -> Result<(), ApiError> {
        self.save_user(follower_id)?;
        self.save_user(followed_id)?;

        let follower = self.state.user_mut(follower_id)?;
        let following_count = follower.following_count + delta;
        if following_count < 0 {
            return Err(ApiError::CounterDrift(follower_id));
        }
        follower.following_count = following_count;

        let followed = self.state.user_mut(followed_id)?;
        let followers_count = followed.followers_count + delta;
        if followers_count < 0 {
            return Err(ApiError::CounterDrift(followed_id));
        }
        followed.followers_count = followers_count;

        Ok(())
    }

    async fn follow_counts(&mut self, user_id: Uuid) -> Result<FollowCounts, ApiError> {
        let user = self.state.user(user_id)?;
        Ok(FollowCounts {
            followers_count: user.followers_count,
            following_count: user.following_count,
        })
    }

    async fn recount_follows(&mut self, user_id: Uuid) -> Result<FollowCounts, ApiError> {
        let mut counts = FollowCounts::default();
        for (follower_id, followed_id) in self.state.follows.keys() {
            if *followed_id == user_id {
                counts.followers_count += 1;
            }
            if *follower_id == user_id {
                counts.following_count += 1;
            }
        }
        Ok(counts)
    }

    async fn set_follow_counts(
        &mut self,
        user_id: Uuid,
        counts: FollowCounts,
    ) -> Result<(), ApiError> {
        self.save_user(user_id)?;
        let user = self.state.user_mut(user_id)?;
        user.followers_count = counts.followers_count;
        user.following_count = counts.following_count;
        Ok(())
    }

    async fn find_friendship(&mut self, a: Uuid, b: Uuid) -> Result<Option<Friendship>, ApiError> {
        Ok(self.state.friendship_between(a, b).cloned())
    }

    async fn get_friendship(&mut self, id: Uuid) -> Result<Option<Friendship>, ApiError> {
        Ok(self.state.friendships.get(&id).cloned())
    }

    async fn create_friendship(
        &mut self,
        requester_id: Uuid,
        recipient_id: Uuid,
        state: FriendshipState,
    ) -> Result<Friendship, ApiError> {
        self.state.user(requester_id)?;
        self.state.user(recipient_id)?;
        // Same guarantee as the unique pair index in Postgres.
        if self
            .state
            .friendship_between(requester_id, recipient_id)
            .is_some()
        {
            return Err(ApiError::InvalidState(format!(
                "a friendship between {} and {} already exists",
                requester_id, recipient_id
            )));
        }

        let friendship = Friendship::new(requester_id, recipient_id, state);
        self.state
            .friendships
            .insert(friendship.id, friendship.clone());
        self.undo.push(Undo::Friendship(friendship.id, None));
        Ok(friendship)
    }

    async fn update_friendship_status(
        &mut self,
        id: Uuid,
        state: FriendshipState,
    ) -> Result<Friendship, ApiError> {
        let friendship = self
            .state
            .friendships
            .get_mut(&id)
            .ok_or_else(|| ApiError::NotFound(format!("friendship {}", id)))?;
        let prior = friendship.clone();
        friendship.state = state;
        friendship.updated_at = Utc::now();
        let updated = friendship.clone();
        self.undo.push(Undo::Friendship(id, Some(prior)));
        Ok(updated)
    }

    async fn delete_friendship(&mut self, id: Uuid) -> Result<bool, ApiError> {
        match self.state.friendships.remove(&id) {
            Some(prior) => {
                self.undo.push(Undo::Friendship(id, Some(prior)));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn friend_list_for(&mut self, user_id: Uuid) -> Result<FriendList, ApiError> {
        let friends = self
            .state
            .friend_lists
            .get(&user_id)
            .cloned()
            .ok_or(ApiError::UserNotFound(user_id))?;
        Ok(FriendList { user_id, friends })
    }

    async fn add_friend(&mut self, owner_id: Uuid, friend_id: Uuid) -> Result<bool, ApiError> {
        self.state.user(friend_id)?;
        if self.is_friend(owner_id, friend_id).await? {
            return Ok(false);
        }
        self.save_friend_list(owner_id)?;
        if let Some(list) = self.state.friend_lists.get_mut(&owner_id) {
            list.push(friend_id);
        }
        Ok(true)
    }

    async fn remove_friend(&mut self, owner_id: Uuid, friend_id: Uuid) -> Result<bool, ApiError> {
        if !self.state.friend_lists.contains_key(&owner_id) {
            return Err(ApiError::UserNotFound(owner_id));
        }
        if !self.is_friend(owner_id, friend_id).await? {
            return Ok(false);
        }
        self.save_friend_list(owner_id)?;
        if let Some(list) = self.state.friend_lists.get_mut(&owner_id) {
            list.retain(|id| *id != friend_id);
        }
        Ok(true)
    }

    async fn is_friend(&mut self, owner_id: Uuid, friend_id: Uuid) -> Result<bool, ApiError> {
        Ok(self
            .state
            .friend_lists
            .get(&owner_id)
            .is_some_and(|list| list.contains(&friend_id)))
    }

    async fn commit(mut self: Box<Self>) -> Result<(), ApiError> {
        self.undo.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_with_users() -> (InMemoryRelationshipRepository, User, User) {
        let store = InMemoryRelationshipRepository::new();
        let alice = store.create_user(&User::new("alice", None)).await.unwrap();
        let bob = store.create_user(&User::new("bob", None)).await.unwrap();
        (store, alice, bob)
    }

    #[tokio::test]
    async fn dropped_unit_of_work_discards_writes() {
        let (store, alice, bob) = store_with_users().await;

        let mut tx = store.begin().await.unwrap();
        assert!(tx.create_follow(alice.id, bob.id).await.unwrap());
        tx.adjust_follow_counts(alice.id, bob.id, 1).await.unwrap();
        tx.add_friend(alice.id, bob.id).await.unwrap();
        drop(tx);

        assert!(!store.is_following(alice.id, bob.id).await.unwrap());
        let bob = store.find_user(bob.id).await.unwrap().unwrap();
        assert_eq!(bob.followers_count, 0);
        assert!(store.list_friends(alice.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn dropped_unit_of_work_restores_removed_and_updated_rows() {
        let (store, alice, bob) = store_with_users().await;

        let mut tx = store.begin().await.unwrap();
        tx.create_follow(alice.id, bob.id).await.unwrap();
        tx.adjust_follow_counts(alice.id, bob.id, 1).await.unwrap();
        let friendship = tx
            .create_friendship(alice.id, bob.id, FriendshipState::Accepted)
            .await
            .unwrap();
        tx.add_friend(alice.id, bob.id).await.unwrap();
        tx.add_friend(bob.id, alice.id).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.delete_follow(alice.id, bob.id).await.unwrap());
        tx.adjust_follow_counts(alice.id, bob.id, -1).await.unwrap();
        tx.update_friendship_status(
            friendship.id,
            FriendshipState::Blocked {
                blocked_by: bob.id,
            },
        )
        .await
        .unwrap();
        tx.remove_friend(alice.id, bob.id).await.unwrap();
        tx.remove_friend(bob.id, alice.id).await.unwrap();
        drop(tx);

        assert!(store.is_following(alice.id, bob.id).await.unwrap());
        let bob_now = store.find_user(bob.id).await.unwrap().unwrap();
        assert_eq!(bob_now.followers_count, 1);
        let row = store.get_friendship(friendship.id).await.unwrap().unwrap();
        assert_eq!(row.state, FriendshipState::Accepted);
        assert_eq!(store.list_friends(alice.id).await.unwrap()[0].id, bob.id);
        assert_eq!(store.list_friends(bob.id).await.unwrap()[0].id, alice.id);
    }

    #[tokio::test]
    async fn committed_unit_of_work_is_visible() {
        let (store, alice, bob) = store_with_users().await;

        let mut tx = store.begin().await.unwrap();
        tx.create_follow(alice.id, bob.id).await.unwrap();
        tx.adjust_follow_counts(alice.id, bob.id, 1).await.unwrap();
        tx.commit().await.unwrap();

        assert!(store.is_following(alice.id, bob.id).await.unwrap());
        let followers = store.list_followers(bob.id).await.unwrap();
        assert_eq!(followers.len(), 1);
        assert_eq!(followers[0].id, alice.id);
        assert_eq!(followers[0].following_count, 1);
    }

    #[tokio::test]
    async fn counters_never_go_negative() {
        let (store, alice, bob) = store_with_users().await;

        let mut tx = store.begin().await.unwrap();
        let err = tx
            .adjust_follow_counts(alice.id, bob.id, -1)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::CounterDrift(id) if id == alice.id));
    }

    #[tokio::test]
    async fn one_friendship_row_per_pair() {
        let (store, alice, bob) = store_with_users().await;

        let mut tx = store.begin().await.unwrap();
        tx.create_friendship(alice.id, bob.id, FriendshipState::Pending)
            .await
            .unwrap();
        let err = tx
            .create_friendship(bob.id, alice.id, FriendshipState::Pending)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidState(_)));
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let (store, _, _) = store_with_users().await;
        let err = store
            .create_user(&User::new("alice", None))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidState(_)));
    }
}
