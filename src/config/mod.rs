// Configuration module for P2Pong sync
// Handles loading and managing match configuration from TOML file

pub mod loader;
pub mod types;

pub use loader::{create_default_config, get_config_path, load_config, load_config_from};
pub use types::{Config, DisplayConfig, PhysicsConfig, SessionConfig, SyncConfig, WireCodec};
