pub mod notification_service;
pub mod relationship_service;
pub mod user_service;
