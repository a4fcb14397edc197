pub mod activity_log_repository;
pub mod kpi_repository;
pub mod notification_repository;
pub mod session_repository;
pub mod task_repository;
pub mod user_repository;
