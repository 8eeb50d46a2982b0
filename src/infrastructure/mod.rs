// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod demo_repository;
pub mod http_repository;
