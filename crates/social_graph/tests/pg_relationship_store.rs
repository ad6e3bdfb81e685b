//! Runs against a real Postgres. Needs `DATABASE_URL` pointing at a server the
//! test user may create databases on:
//!
//! `cargo test -p social_graph --features postgres-tests --test pg_relationship_store`
#![cfg(feature = "postgres-tests")]

use std::sync::Arc;

use social_graph::{
    models::{
        friendships::{FriendshipRow, FriendshipState},
        relationships::FriendRequestOutcome,
        user_follows::FollowCounts,
        users::CreateUserRequest,
    },
    repositories::{
        pg_relationship_repository::PgRelationshipRepository,
        relationship_repository::{RelationshipStore, RelationshipTx},
    },
    services::{
        notification_service::LogActivityNotifier, relationship_service::RelationshipService,
        user_service::UserService,
    },
    utils::api_errors::ApiError,
};
use sqlx::PgPool;
use uuid::Uuid;

struct PgGraph {
    pool: PgPool,
    store: Arc<PgRelationshipRepository>,
    users: UserService,
    relationships: RelationshipService,
}

impl PgGraph {
    fn new(pool: PgPool) -> Self {
        let store = Arc::new(PgRelationshipRepository::new(Arc::new(pool.clone())));
        let shared: Arc<dyn RelationshipStore> = store.clone();

        PgGraph {
            pool,
            users: UserService::new(shared.clone()),
            relationships: RelationshipService::new(shared, Arc::new(LogActivityNotifier)),
            store,
        }
    }

    async fn user(&self, username: &str) -> Uuid {
        let request = CreateUserRequest {
            username: username.to_string(),
            bio: None,
        };
        self.users.create_user(&request).await.unwrap().id
    }

    async fn counts(&self, user_id: Uuid) -> FollowCounts {
        let user = self.users.get_user(user_id).await.unwrap();
        FollowCounts {
            followers_count: user.followers_count,
            following_count: user.following_count,
        }
    }

    async fn assert_consistent(&self, user_id: Uuid) {
        let audit = self.users.audit_follow_counts(user_id).await.unwrap();
        assert!(!audit.has_drift(), "counters drifted: {:?}", audit);
        let friends = self.users.audit_friend_list(user_id).await.unwrap();
        assert!(friends.is_symmetric(), "one-sided friend list: {:?}", friends);
    }

    async fn friendship_rows(&self) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM social.friendships")
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }
}

fn counts(followers_count: i32, following_count: i32) -> FollowCounts {
    FollowCounts {
        followers_count,
        following_count,
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn request_accept_remove_scenario(pool: PgPool) {
    let graph = PgGraph::new(pool);
    let alice = graph.user("alice").await;
    let bob = graph.user("bob").await;

    let outcome = graph
        .relationships
        .send_friend_request(alice, bob)
        .await
        .unwrap();
    let friendship = match outcome {
        FriendRequestOutcome::Sent { friendship } => friendship,
        other => panic!("expected a new request, got {:?}", other),
    };
    assert_eq!(friendship.state, FriendshipState::Pending);

    let requests = graph.store.list_pending_requests(bob).await.unwrap();
    assert_eq!(requests.incoming.len(), 1);
    assert!(requests.outgoing.is_empty());

    let accepted = graph
        .relationships
        .accept_friend_request(bob, friendship.id)
        .await
        .unwrap();
    assert_eq!(accepted.state, FriendshipState::Accepted);

    let mut tx = graph.store.begin().await.unwrap();
    assert!(tx.friend_list_for(alice).await.unwrap().contains(bob));
    assert!(tx.friend_list_for(bob).await.unwrap().contains(alice));
    drop(tx);
    assert_eq!(graph.store.list_friends(alice).await.unwrap()[0].id, bob);

    graph.relationships.remove_friend(bob, alice).await.unwrap();
    assert!(graph.store.find_friendship(alice, bob).await.unwrap().is_none());
    assert!(graph.store.list_friends(alice).await.unwrap().is_empty());
    assert!(graph.store.list_friends(bob).await.unwrap().is_empty());
    for user in [alice, bob] {
        graph.assert_consistent(user).await;
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn block_cascade_clears_follows_and_friends(pool: PgPool) {
    let graph = PgGraph::new(pool);
    let alice = graph.user("alice").await;
    let bob = graph.user("bob").await;

    graph.relationships.toggle_follow(alice, bob).await.unwrap();
    graph.relationships.toggle_follow(bob, alice).await.unwrap();
    let request = graph
        .relationships
        .send_friend_request(alice, bob)
        .await
        .unwrap();
    graph
        .relationships
        .accept_friend_request(bob, request.friendship().id)
        .await
        .unwrap();

    let blocked = graph.relationships.block_user(bob, alice).await.unwrap();
    assert_eq!(blocked.id, request.friendship().id);
    assert_eq!(blocked.state, FriendshipState::Blocked { blocked_by: bob });

    assert!(!graph.store.is_following(alice, bob).await.unwrap());
    assert!(!graph.store.is_following(bob, alice).await.unwrap());
    assert!(graph.store.list_friends(alice).await.unwrap().is_empty());
    assert!(graph.store.list_friends(bob).await.unwrap().is_empty());
    assert_eq!(graph.counts(alice).await, counts(0, 0));
    assert_eq!(graph.counts(bob).await, counts(0, 0));
    for user in [alice, bob] {
        graph.assert_consistent(user).await;
    }

    // The blocker column round-trips through the row conversion.
    let row = sqlx::query_as::<_, FriendshipRow>("SELECT * FROM social.friendships WHERE id = $1")
        .bind(blocked.id)
        .fetch_one(&graph.pool)
        .await
        .unwrap();
    assert_eq!(row.status, "blocked");
    assert_eq!(row.blocked_by, Some(bob));

    let taken_over = graph.relationships.block_user(alice, bob).await.unwrap();
    assert_eq!(taken_over.state, FriendshipState::Blocked { blocked_by: alice });
    assert!(matches!(
        graph.relationships.unblock_user(bob, alice).await,
        Err(ApiError::InvalidState(_))
    ));
    graph.relationships.unblock_user(alice, bob).await.unwrap();
    assert_eq!(graph.friendship_rows().await, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn blocked_status_requires_a_blocker(pool: PgPool) {
    let graph = PgGraph::new(pool);
    let alice = graph.user("alice").await;
    let bob = graph.user("bob").await;

    let result = sqlx::query(
        "INSERT INTO social.friendships (id, requester_id, recipient_id, status, blocked_by)
         VALUES ($1, $2, $3, 'blocked', NULL)",
    )
    .bind(Uuid::new_v4())
    .bind(alice)
    .bind(bob)
    .execute(&graph.pool)
    .await;

    match result {
        Err(sqlx::Error::Database(err)) => assert!(err.is_check_violation()),
        other => panic!("expected a check violation, got {:?}", other),
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn reverse_direction_row_is_refused(pool: PgPool) {
    let graph = PgGraph::new(pool);
    let alice = graph.user("alice").await;
    let bob = graph.user("bob").await;

    let mut tx = graph.store.begin().await.unwrap();
    tx.create_friendship(alice, bob, FriendshipState::Pending)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = graph.store.begin().await.unwrap();
    match tx
        .create_friendship(bob, alice, FriendshipState::Pending)
        .await
    {
        Err(ApiError::DatabaseError(sqlx::Error::Database(err))) => {
            assert!(err.is_unique_violation())
        }
        other => panic!("expected a unique violation, got {:?}", other),
    }
    drop(tx);

    assert_eq!(graph.friendship_rows().await, 1);

    let outcome = graph
        .relationships
        .send_friend_request(bob, alice)
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        FriendRequestOutcome::AwaitingResponse { .. }
    ));
    assert_eq!(graph.friendship_rows().await, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn duplicate_follow_insert_reports_no_write(pool: PgPool) {
    let graph = PgGraph::new(pool);
    let alice = graph.user("alice").await;
    let bob = graph.user("bob").await;

    let mut tx = graph.store.begin().await.unwrap();
    assert!(tx.create_follow(alice, bob).await.unwrap());
    assert!(!tx.create_follow(alice, bob).await.unwrap());
    assert!(tx.delete_follow(alice, bob).await.unwrap());
    assert!(!tx.delete_follow(alice, bob).await.unwrap());
    tx.commit().await.unwrap();
}

#[sqlx::test(migrations = "./migrations")]
async fn concurrent_toggles_never_double_count(pool: PgPool) {
    let graph = PgGraph::new(pool);
    let alice = graph.user("alice").await;
    let bob = graph.user("bob").await;

    let handles: Vec<_> = (0..7)
        .map(|_| {
            let service = graph.relationships.clone();
            tokio::spawn(async move { service.toggle_follow(alice, bob).await })
        })
        .collect();
    let mut followed = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().followed {
            followed += 1;
        }
    }

    // Seven serialized toggles alternate, starting from "not following".
    assert_eq!(followed, 4);
    assert!(graph.store.is_following(alice, bob).await.unwrap());
    assert_eq!(graph.counts(bob).await, counts(1, 0));
    assert_eq!(graph.counts(alice).await, counts(0, 1));
    graph.assert_consistent(alice).await;
    graph.assert_consistent(bob).await;
}

#[sqlx::test(migrations = "./migrations")]
async fn crossed_requests_share_one_row(pool: PgPool) {
    let graph = PgGraph::new(pool);
    let alice = graph.user("alice").await;
    let bob = graph.user("bob").await;

    let first = graph.relationships.clone();
    let second = graph.relationships.clone();
    let (a, b) = tokio::join!(
        tokio::spawn(async move { first.send_friend_request(alice, bob).await }),
        tokio::spawn(async move { second.send_friend_request(bob, alice).await }),
    );
    let a = a.unwrap().unwrap();
    let b = b.unwrap().unwrap();

    assert_eq!(a.friendship().id, b.friendship().id);
    assert_eq!(graph.friendship_rows().await, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn counter_drift_rolls_back_and_reconciles(pool: PgPool) {
    let graph = PgGraph::new(pool);
    let alice = graph.user("alice").await;
    let bob = graph.user("bob").await;
    graph.relationships.toggle_follow(alice, bob).await.unwrap();

    sqlx::query("UPDATE social.users SET followers_count = 0 WHERE id = $1")
        .bind(bob)
        .execute(&graph.pool)
        .await
        .unwrap();

    let err = graph
        .relationships
        .toggle_follow(alice, bob)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::CounterDrift(id) if id == bob));
    assert!(graph.store.is_following(alice, bob).await.unwrap());
    assert_eq!(graph.counts(alice).await, counts(0, 1));

    let audit = graph.users.reconcile_follow_counts(bob).await.unwrap();
    assert_eq!(audit.stored, counts(0, 0));
    assert_eq!(audit.actual, counts(1, 0));
    graph.assert_consistent(bob).await;
}

#[sqlx::test(migrations = "./migrations")]
async fn duplicate_username_is_invalid_state(pool: PgPool) {
    let graph = PgGraph::new(pool);
    graph.user("alice").await;

    let request = CreateUserRequest {
        username: "alice".to_string(),
        bio: None,
    };
    assert!(matches!(
        graph.users.create_user(&request).await,
        Err(ApiError::InvalidState(_))
    ));
}
