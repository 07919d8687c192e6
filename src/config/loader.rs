// Configuration file loading and creation

use super::types::Config;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Get the path to the configuration file
pub fn get_config_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("p2pong-sync");

    // Create config directory if it doesn't exist
    fs::create_dir_all(&path).ok();

    path.push("config.toml");
    path
}

/// Load configuration from file, or create default if it doesn't exist
pub fn load_config() -> Result<Config, io::Error> {
    load_config_from(&get_config_path())
}

/// Load configuration from an explicit path
pub fn load_config_from(config_path: &Path) -> Result<Config, io::Error> {
    if config_path.exists() {
        let contents = fs::read_to_string(config_path)?;
        Ok(parse_config(&contents))
    } else {
        create_default_config(config_path)?;
        Ok(Config::default())
    }
}

/// Parse TOML, falling back to defaults when the file is broken
pub fn parse_config(contents: &str) -> Config {
    match toml::from_str(contents) {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to parse config file: {}", e);
            warn!("Using default configuration");
            Config::default()
        }
    }
}

/// Create a default configuration file with helpful comments
pub fn create_default_config(path: &Path) -> Result<(), io::Error> {
    let config = Config::default();
    let toml_string = toml::to_string_pretty(&config).map_err(io::Error::other)?;

    let commented_toml = format!(
        "# P2Pong sync configuration file\n\
         # Both peers must agree on [physics]; mismatched fields give a desynced court\n\
         #\n\
         # Times are in milliseconds, velocities in units per nominal frame\n\
         # codec: \"json\" or \"bincode\"\n\n\
         {}",
        toml_string
    );

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, commented_toml)?;
    println!("Created default config file at: {}", path.display());
    Ok(())
}
