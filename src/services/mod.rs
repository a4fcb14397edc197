pub mod activity_service;
pub mod auth_service;
pub mod evaluation_service;
pub mod import_service;
pub mod kpi_service;
pub mod notification_service;
pub mod task_service;
pub mod user_service;
