pub mod config;
pub mod config_loader;
pub mod sanitize;

pub use config::AppConfig;
pub use config_loader::ConfigLoader;
