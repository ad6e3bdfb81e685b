use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use crate::{
    models::{
        friend_lists::FriendList,
        friendships::{Friendship, FriendshipRow, FriendshipState},
        relationships::FriendRequests,
        user_follows::{FollowCounts, UserFollow},
        users::User,
    },
    utils::api_errors::ApiError,
};

use super::relationship_repository::{RelationshipStore, RelationshipTx};

pub struct PgRelationshipRepository {
    db: Arc<PgPool>,
}

impl PgRelationshipRepository {
    pub fn new(db: Arc<PgPool>) -> Self {
        PgRelationshipRepository { db }
    }
}

async fn fetch_user<'e, E: PgExecutor<'e>>(
    executor: E,
    id: Uuid,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM social.users WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await
}

async fn fetch_follow<'e, E: PgExecutor<'e>>(
    executor: E,
    follower_id: Uuid,
    followed_id: Uuid,
) -> Result<Option<UserFollow>, sqlx::Error> {
    sqlx::query_as::<_, UserFollow>(
        "SELECT * FROM social.user_follows WHERE follower_id = $1 AND followed_id = $2",
    )
    .bind(follower_id)
    .bind(followed_id)
    .fetch_optional(executor)
    .await
}

async fn fetch_friendship_between<'e, E: PgExecutor<'e>>(
    executor: E,
    a: Uuid,
    b: Uuid,
) -> Result<Option<Friendship>, ApiError> {
    let query = r#"
        SELECT * FROM social.friendships
        WHERE (requester_id = $1 AND recipient_id = $2)
           OR (requester_id = $2 AND recipient_id = $1)
        "#;
    sqlx::query_as::<_, FriendshipRow>(query)
        .bind(a)
        .bind(b)
        .fetch_optional(executor)
        .await?
        .map(Friendship::try_from)
        .transpose()
}

async fn fetch_friendship<'e, E: PgExecutor<'e>>(
    executor: E,
    id: Uuid,
) -> Result<Option<Friendship>, ApiError> {
    sqlx::query_as::<_, FriendshipRow>("SELECT * FROM social.friendships WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await?
        .map(Friendship::try_from)
        .transpose()
}

#[async_trait]
impl RelationshipStore for PgRelationshipRepository {
    async fn begin(&self) -> Result<Box<dyn RelationshipTx>, ApiError> {
        let tx = self.db.begin().await?;
        Ok(Box::new(PgRelationshipTx { tx }))
    }

    async fn create_user(&self, user: &User) -> Result<User, ApiError> {
        let mut tx = self.db.begin().await?;

        let created = sqlx::query_as::<_, User>(
            "INSERT INTO social.users (id, username, bio, followers_count, following_count, created_at)
             VALUES ($1, $2, $3, 0, 0, $4)
             RETURNING *",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.bio)
        .bind(user.created_at)
        .fetch_one(tx.as_mut())
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                ApiError::InvalidState(format!("username {} is taken", user.username))
            }
            other => ApiError::DatabaseError(other),
        })?;

        sqlx::query("INSERT INTO social.friend_lists (user_id) VALUES ($1)")
            .bind(created.id)
            .execute(tx.as_mut())
            .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, ApiError> {
        Ok(fetch_user(self.db.as_ref(), id).await?)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM social.users WHERE username = $1")
            .bind(username)
            .fetch_optional(self.db.as_ref())
            .await?;
        Ok(user)
    }

    async fn is_following(&self, follower_id: Uuid, followed_id: Uuid) -> Result<bool, ApiError> {
        let query = r#"
        SELECT EXISTS (SELECT 1 FROM social.user_follows WHERE follower_id = $1 AND followed_id = $2)
        "#;
        let exists = sqlx::query_scalar::<_, bool>(query)
            .bind(follower_id)
            .bind(followed_id)
            .fetch_one(self.db.as_ref())
            .await?;

        Ok(exists)
    }

    async fn list_followers(&self, user_id: Uuid) -> Result<Vec<User>, ApiError> {
        let query = r#"
        SELECT u.*
        FROM social.users u
        INNER JOIN social.user_follows uf ON u.id = uf.follower_id
        WHERE uf.followed_id = $1
        ORDER BY uf.created_at DESC
        "#;

        let followers = sqlx::query_as::<_, User>(query)
            .bind(user_id)
            .fetch_all(self.db.as_ref())
            .await?;

        Ok(followers)
    }

    async fn list_following(&self, user_id: Uuid) -> Result<Vec<User>, ApiError> {
        let query = r#"
        SELECT u.*
        FROM social.users u
        INNER JOIN social.user_follows uf ON u.id = uf.followed_id
        WHERE uf.follower_id = $1
        ORDER BY uf.created_at DESC
        "#;

        let following = sqlx::query_as::<_, User>(query)
            .bind(user_id)
            .fetch_all(self.db.as_ref())
            .await?;

        Ok(following)
    }

    async fn list_friends(&self, user_id: Uuid) -> Result<Vec<User>, ApiError> {
        let query = r#"
        SELECT u.*
        FROM social.users u
        INNER JOIN social.friend_list_members m ON u.id = m.friend_id
        WHERE m.owner_id = $1
        ORDER BY m.added_at DESC
        "#;

        let friends = sqlx::query_as::<_, User>(query)
            .bind(user_id)
            .fetch_all(self.db.as_ref())
            .await?;

        Ok(friends)
    }

    async fn list_pending_requests(&self, user_id: Uuid) -> Result<FriendRequests, ApiError> {
        let query = r#"
        SELECT * FROM social.friendships
        WHERE status = 'pending' AND (requester_id = $1 OR recipient_id = $1)
        ORDER BY created_at DESC
        "#;

        let rows = sqlx::query_as::<_, FriendshipRow>(query)
            .bind(user_id)
            .fetch_all(self.db.as_ref())
            .await?;

        let mut requests = FriendRequests::default();
        for row in rows {
            let friendship = Friendship::try_from(row)?;
            if friendship.recipient_id == user_id {
                requests.incoming.push(friendship);
            } else {
                requests.outgoing.push(friendship);
            }
        }

        Ok(requests)
    }

    async fn find_friendship(&self, a: Uuid, b: Uuid) -> Result<Option<Friendship>, ApiError> {
        fetch_friendship_between(self.db.as_ref(), a, b).await
    }

    async fn get_friendship(&self, id: Uuid) -> Result<Option<Friendship>, ApiError> {
        fetch_friendship(self.db.as_ref(), id).await
    }
}

pub struct PgRelationshipTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl RelationshipTx for PgRelationshipTx {
    async fn lock_users(&mut self, a: Uuid, b: Uuid) -> Result<Vec<User>, ApiError> {
        // Fixed lock order keeps two units on the same pair from deadlocking.
        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM social.users WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(vec![a, b])
        .fetch_all(self.tx.as_mut())
        .await?;

        Ok(users)
    }

    async fn find_user(&mut self, id: Uuid) -> Result<Option<User>, ApiError> {
        Ok(fetch_user(self.tx.as_mut(), id).await?)
    }

    async fn get_follow(
        &mut self,
        follower_id: Uuid,
        followed_id: Uuid,
    ) -> Result<Option<UserFollow>, ApiError> {
        Ok(fetch_follow(self.tx.as_mut(), follower_id, followed_id).await?)
    }

    async fn create_follow(
        &mut self,
        follower_id: Uuid,
        followed_id: Uuid,
    ) -> Result<bool, ApiError> {
        let result = sqlx::query(
            "INSERT INTO social.user_follows (follower_id, followed_id, created_at)
             VALUES ($1, $2, $3)
             ON CONFLICT (follower_id, followed_id) DO NOTHING",
        )
        .bind(follower_id)
        .bind(followed_id)
        .bind(Utc::now())
        .execute(self.tx.as_mut())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_follow(
        &mut self,
        follower_id: Uuid,
        followed_id: Uuid,
    ) -> Result<bool, ApiError> {
        let result = sqlx::query(
            "DELETE FROM social.user_follows WHERE follower_id = $1 AND followed_id = $2",
        )
        .bind(follower_id)
        .bind(followed_id)
        .execute(self.tx.as_mut())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn adjust_follow_counts(
        &mut self,
        follower_id: Uuid,
        followed_id: Uuid,
        delta: i32,
    ) -> Result<(), ApiError> {
        let following = sqlx::query(
            "UPDATE social.users SET following_count = following_count + $2
             WHERE id = $1 AND following_count + $2 >= 0",
        )
        .bind(follower_id)
        .bind(delta)
        .execute(self.tx.as_mut())
        .await?;
        if following.rows_affected() != 1 {
            error!("following_count of {} would go negative", follower_id);
            return Err(ApiError::CounterDrift(follower_id));
        }

        let followers = sqlx::query(
            "UPDATE social.users SET followers_count = followers_count + $2
             WHERE id = $1 AND followers_count + $2 >= 0",
        )
        .bind(followed_id)
        .bind(delta)
        .execute(self.tx.as_mut())
        .await?;
        if followers.rows_affected() != 1 {
            error!("followers_count of {} would go negative", followed_id);
            return Err(ApiError::CounterDrift(followed_id));
        }

        Ok(())
    }

    async fn follow_counts(&mut self, user_id: Uuid) -> Result<FollowCounts, ApiError> {
        sqlx::query_as::<_, FollowCounts>(
            "SELECT followers_count, following_count FROM social.users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.tx.as_mut())
        .await?
        .ok_or(ApiError::UserNotFound(user_id))
    }

    async fn recount_follows(&mut self, user_id: Uuid) -> Result<FollowCounts, ApiError> {
        let query = r#"
        SELECT
            (SELECT COUNT(*) FROM social.user_follows WHERE followed_id = $1)::INT4 AS followers_count,
            (SELECT COUNT(*) FROM social.user_follows WHERE follower_id = $1)::INT4 AS following_count
        "#;
        let counts = sqlx::query_as::<_, FollowCounts>(query)
            .bind(user_id)
            .fetch_one(self.tx.as_mut())
            .await?;

        Ok(counts)
    }

    async fn set_follow_counts(
        &mut self,
        user_id: Uuid,
        counts: FollowCounts,
    ) -> Result<(), ApiError> {
        let result = sqlx::query(
            "UPDATE social.users SET followers_count = $2, following_count = $3 WHERE id = $1",
        )
        .bind(user_id)
        .bind(counts.followers_count)
        .bind(counts.following_count)
        .execute(self.tx.as_mut())
        .await?;

        if result.rows_affected() != 1 {
            return Err(ApiError::UserNotFound(user_id));
        }
        Ok(())
    }

    async fn find_friendship(&mut self, a: Uuid, b: Uuid) -> Result<Option<Friendship>, ApiError> {
        fetch_friendship_between(self.tx.as_mut(), a, b).await
    }

    async fn get_friendship(&mut self, id: Uuid) -> Result<Option<Friendship>, ApiError> {
        fetch_friendship(self.tx.as_mut(), id).await
    }

    async fn create_friendship(
        &mut self,
        requester_id: Uuid,
        recipient_id: Uuid,
        state: FriendshipState,
    ) -> Result<Friendship, ApiError> {
        let friendship = Friendship::new(requester_id, recipient_id, state);
        let row = sqlx::query_as::<_, FriendshipRow>(
            "INSERT INTO social.friendships
                (id, requester_id, recipient_id, status, blocked_by, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(friendship.id)
        .bind(requester_id)
        .bind(recipient_id)
        .bind(state.as_str())
        .bind(state.blocked_by())
        .bind(friendship.created_at)
        .bind(friendship.updated_at)
        .fetch_one(self.tx.as_mut())
        .await?;

        Friendship::try_from(row)
    }

    async fn update_friendship_status(
        &mut self,
        id: Uuid,
        state: FriendshipState,
    ) -> Result<Friendship, ApiError> {
        let row = sqlx::query_as::<_, FriendshipRow>(
            "UPDATE social.friendships
             SET status = $2, blocked_by = $3, updated_at = $4
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(state.as_str())
        .bind(state.blocked_by())
        .bind(Utc::now())
        .fetch_optional(self.tx.as_mut())
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("friendship {}", id)))?;

        Friendship::try_from(row)
    }

    async fn delete_friendship(&mut self, id: Uuid) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM social.friendships WHERE id = $1")
            .bind(id)
            .execute(self.tx.as_mut())
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn friend_list_for(&mut self, user_id: Uuid) -> Result<FriendList, ApiError> {
        let friends = sqlx::query_scalar::<_, Uuid>(
            "SELECT friend_id FROM social.friend_list_members WHERE owner_id = $1 ORDER BY added_at",
        )
        .bind(user_id)
        .fetch_all(self.tx.as_mut())
        .await?;

        Ok(FriendList { user_id, friends })
    }

    async fn add_friend(&mut self, owner_id: Uuid, friend_id: Uuid) -> Result<bool, ApiError> {
        let result = sqlx::query(
            "INSERT INTO social.friend_list_members (owner_id, friend_id, added_at)
             VALUES ($1, $2, $3)
             ON CONFLICT (owner_id, friend_id) DO NOTHING",
        )
        .bind(owner_id)
        .bind(friend_id)
        .bind(Utc::now())
        .execute(self.tx.as_mut())
        .await?;

        sqlx::query("UPDATE social.friend_lists SET updated_at = NOW() WHERE user_id = $1")
            .bind(owner_id)
            .execute(self.tx.as_mut())
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn remove_friend(&mut self, owner_id: Uuid, friend_id: Uuid) -> Result<bool, ApiError> {
        let result = sqlx::query(
            "DELETE FROM social.friend_list_members WHERE owner_id = $1 AND friend_id = $2",
        )
        .bind(owner_id)
        .bind(friend_id)
        .execute(self.tx.as_mut())
        .await?;

        if result.rows_affected() == 1 {
            sqlx::query("UPDATE social.friend_lists SET updated_at = NOW() WHERE user_id = $1")
                .bind(owner_id)
                .execute(self.tx.as_mut())
                .await?;
        }

        Ok(result.rows_affected() == 1)
    }

    async fn is_friend(&mut self, owner_id: Uuid, friend_id: Uuid) -> Result<bool, ApiError> {
        let query = r#"
        SELECT EXISTS (SELECT 1 FROM social.friend_list_members WHERE owner_id = $1 AND friend_id = $2)
        "#;
        let exists = sqlx::query_scalar::<_, bool>(query)
            .bind(owner_id)
            .bind(friend_id)
            .fetch_one(self.tx.as_mut())
            .await?;

        Ok(exists)
    }

    async fn commit(self: Box<Self>) -> Result<(), ApiError> {
        self.tx.commit().await?;
        Ok(())
    }
}
