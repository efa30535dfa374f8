//! Configuration module
//!
//! - `settings` - The configuration value, defaults, validation and JSON persistence
//! - `config_manager` - Shared, auto-persisting access for the plugin and control surface

pub mod config_manager;
pub mod settings;

pub use config_manager::ConfigManager;
pub use settings::Settings;
