pub mod activity;
pub mod import;
pub mod kpi;
pub mod notification;
pub mod task;
pub mod user;
