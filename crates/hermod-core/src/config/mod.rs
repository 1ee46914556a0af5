//! Configuration: typed schema plus the JSON loader with env overrides.

pub mod loader;
pub mod schema;

pub use loader::{config_path, load_config, save_config};
pub use schema::Config;
