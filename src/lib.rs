pub mod monitor_modules;
pub mod notifications;
pub mod version;
