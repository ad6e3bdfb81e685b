pub mod memory_relationship_repository;
pub mod pg_relationship_repository;
pub mod relationship_repository;
