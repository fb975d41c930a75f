pub mod api;
pub mod care;
pub mod config;
pub mod entities;
pub mod error;
pub mod metrics;
pub mod migrator;
pub mod notifications;
pub mod reminders;
pub mod store;
pub mod telemetry;

pub use sea_orm;
