use dotenv::dotenv;
use social_graph::{settings, setup_notifier, setup_store, AppState};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let settings = settings::load_settings()?;
    social_graph::init_tracing(&settings);

    let store = setup_store(&settings).await?;
    let notifier = setup_notifier(&settings)?;
    let state = Arc::new(AppState::new(store, notifier));

    seed::seed_data(&state).await?;

    Ok(())
}

mod seed {
    use fake::{faker::internet::en::Username, faker::lorem::en::Sentence, Fake};
    use rand::{seq::SliceRandom, Rng};
    use social_graph::{
        models::users::CreateUserRequest, utils::api_errors::ApiError, AppState,
    };
    use tracing::{info, warn};
    use uuid::Uuid;

    const USERS: usize = 20;
    const FOLLOWS: usize = 60;
    const FRIEND_REQUESTS: usize = 25;
    const BLOCKS: usize = 3;

    pub async fn seed_data(state: &AppState) -> Result<(), Box<dyn std::error::Error>> {
        let user_ids = seed_users(state, USERS).await?;
        if user_ids.len() < 2 {
            warn!("Not enough users to seed relationships");
            return Ok(());
        }

        seed_follows(state, &user_ids, FOLLOWS).await?;
        seed_friendships(state, &user_ids, FRIEND_REQUESTS).await?;
        seed_blocks(state, &user_ids, BLOCKS).await?;

        println!("Seed data inserted successfully");
        Ok(())
    }

    /// Picks `count` ordered pairs of distinct users.
    fn random_pairs(user_ids: &[Uuid], count: usize) -> Vec<(Uuid, Uuid)> {
        let mut rng = rand::thread_rng();
        (0..count)
            .filter_map(|_| {
                let pair: Vec<&Uuid> = user_ids.choose_multiple(&mut rng, 2).collect();
                match pair.as_slice() {
                    [a, b] => Some((**a, **b)),
                    _ => None,
                }
            })
            .collect()
    }

    async fn seed_users(
        state: &AppState,
        count: usize,
    ) -> Result<Vec<Uuid>, Box<dyn std::error::Error>> {
        let mut user_ids = Vec::new();

        for _ in 0..count {
            let request = CreateUserRequest {
                username: Username().fake(),
                bio: Some(Sentence(3..8).fake()),
            };

            match state.user_service.create_user(&request).await {
                Ok(user) => user_ids.push(user.id),
                // Fake usernames can collide with earlier runs.
                Err(ApiError::InvalidState(e)) => warn!("Skipping user: {}", e),
                Err(e) => return Err(e.into()),
            }
        }

        info!("Seeded {} users", user_ids.len());
        Ok(user_ids)
    }

    async fn seed_follows(
        state: &AppState,
        user_ids: &[Uuid],
        count: usize,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mut followed = 0;
        for (follower_id, followed_id) in random_pairs(user_ids, count) {
            let result = state
                .relationship_service
                .toggle_follow(follower_id, followed_id)
                .await?;
            if result.followed {
                followed += 1;
            }
        }

        info!("Seeded {} follows", followed);
        Ok(())
    }

    async fn seed_friendships(
        state: &AppState,
        user_ids: &[Uuid],
        count: usize,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let pairs = random_pairs(user_ids, count);
        let decisions: Vec<u8> = {
            let mut rng = rand::thread_rng();
            pairs.iter().map(|_| rng.gen_range(0..3)).collect()
        };

        for ((requester_id, recipient_id), decision) in pairs.into_iter().zip(decisions) {
            let outcome = state
                .relationship_service
                .send_friend_request(requester_id, recipient_id)
                .await?;
            if !outcome.created() {
                continue;
            }

            let request_id = outcome.friendship().id;
            match decision {
                0 => {
                    state
                        .relationship_service
                        .reject_friend_request(recipient_id, request_id)
                        .await?;
                }
                1 => {
                    state
                        .relationship_service
                        .accept_friend_request(recipient_id, request_id)
                        .await?;
                }
                _ => {}
            }
        }

        info!("Seeded friend requests");
        Ok(())
    }

    async fn seed_blocks(
        state: &AppState,
        user_ids: &[Uuid],
        count: usize,
    ) -> Result<(), Box<dyn std::error::Error>> {
        for (blocker_id, blocked_id) in random_pairs(user_ids, count) {
            match state
                .relationship_service
                .block_user(blocker_id, blocked_id)
                .await
            {
                Ok(_) => {}
                Err(ApiError::Blocked) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        info!("Seeded blocks");
        Ok(())
    }
}
