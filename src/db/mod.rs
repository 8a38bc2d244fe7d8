pub mod mock_db;
pub mod postgres_workflow_repository;
pub mod workflow_repository;
