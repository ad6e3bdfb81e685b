pub mod activity;
pub mod friend_lists;
pub mod friendships;
pub mod relationships;
pub mod user_follows;
pub mod users;
