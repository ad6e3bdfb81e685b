use crate::models::friend_lists::FriendListAudit;
use crate::models::user_follows::FollowCountAudit;
use crate::models::users::{CreateUserRequest, User, UserResponse};
use crate::repositories::relationship_repository::RelationshipStore;
use crate::utils::api_errors::ApiError;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn RelationshipStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn RelationshipStore>) -> Self {
        Self { store }
    }

    pub async fn create_user(&self, request: &CreateUserRequest) -> Result<UserResponse, ApiError> {
        let username = request.username.trim();
        if username.is_empty() {
            return Err(ApiError::BadRequest("username must not be empty".to_string()));
        }

        let user = self
            .store
            .create_user(&User::new(username, request.bio.clone()))
            .await?;
        info!("Created user {} ({})", user.username, user.id);
        Ok(UserResponse::from(user))
    }

    pub async fn get_user(&self, id: Uuid) -> Result<UserResponse, ApiError> {
        let user = self
            .store
            .find_user(id)
            .await?
            .ok_or(ApiError::UserNotFound(id))?;
        Ok(UserResponse::from(user))
    }

    pub async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserResponse>, ApiError> {
        let user = self.store.find_user_by_username(username).await?;
        Ok(user.map(UserResponse::from))
    }

    pub async fn get_followers(&self, user_id: Uuid) -> Result<Vec<UserResponse>, ApiError> {
        self.get_user(user_id).await?;
        let followers = self.store.list_followers(user_id).await?;
        Ok(followers.into_iter().map(UserResponse::from).collect())
    }

    pub async fn get_following(&self, user_id: Uuid) -> Result<Vec<UserResponse>, ApiError> {
        self.get_user(user_id).await?;
        let following = self.store.list_following(user_id).await?;
        Ok(following.into_iter().map(UserResponse::from).collect())
    }

    /// Compares the stored follow counters with a fresh count of the edges.
    pub async fn audit_follow_counts(&self, user_id: Uuid) -> Result<FollowCountAudit, ApiError> {
        let mut tx = self.store.begin().await?;
        let stored = tx.follow_counts(user_id).await?;
        let actual = tx.recount_follows(user_id).await?;

        Ok(FollowCountAudit {
            user_id,
            stored,
            actual,
        })
    }

    /// Rewrites the follow counters from the edges. Returns the audit taken
    /// before the rewrite.
    pub async fn reconcile_follow_counts(
        &self,
        user_id: Uuid,
    ) -> Result<FollowCountAudit, ApiError> {
        let mut tx = self.store.begin().await?;
        if tx.lock_users(user_id, user_id).await?.is_empty() {
            return Err(ApiError::UserNotFound(user_id));
        }

        let audit = FollowCountAudit {
            user_id,
            stored: tx.follow_counts(user_id).await?,
            actual: tx.recount_follows(user_id).await?,
        };
        if audit.has_drift() {
            warn!(
                "Follow counters of {} drifted: stored {:?}, actual {:?}",
                user_id, audit.stored, audit.actual
            );
            tx.set_follow_counts(user_id, audit.actual).await?;
            tx.commit().await?;
        }

        Ok(audit)
    }

    /// Checks that every friend of `user_id` lists `user_id` back.
    pub async fn audit_friend_list(&self, user_id: Uuid) -> Result<FriendListAudit, ApiError> {
        let mut tx = self.store.begin().await?;
        if tx.find_user(user_id).await?.is_none() {
            return Err(ApiError::UserNotFound(user_id));
        }

        let list = tx.friend_list_for(user_id).await?;
        let mut one_sided = Vec::new();
        for &friend_id in &list.friends {
            if !tx.is_friend(friend_id, user_id).await? {
                one_sided.push(friend_id);
            }
        }
        if !one_sided.is_empty() {
            warn!("Friend list of {} is one-sided for {:?}", user_id, one_sided);
        }

        Ok(FriendListAudit {
            user_id,
            friend_count: list.count(),
            one_sided,
        })
    }
}
