//! Default paths for playtime components
//!
//! Paths are user-writable by default:
//! - Config: `$XDG_CONFIG_HOME/playtime/config.toml` or `~/.config/playtime/config.toml`
//! - Data: `$XDG_DATA_HOME/playtime` or `~/.local/share/playtime`

use std::path::PathBuf;

/// Environment variable for overriding the config file path
pub const PLAYTIME_CONFIG_ENV: &str = "PLAYTIME_CONFIG";

/// Environment variable for overriding the data directory
pub const PLAYTIME_DATA_DIR_ENV: &str = "PLAYTIME_DATA_DIR";

const CONFIG_FILENAME: &str = "config.toml";

const APP_DIR: &str = "playtime";

/// Database filename within the data directory
pub const DB_FILENAME: &str = "playtime.db";

/// Get the default config path.
///
/// Order of precedence:
/// 1. `$PLAYTIME_CONFIG`
/// 2. `$XDG_CONFIG_HOME/playtime/config.toml`
/// 3. `~/.config/playtime/config.toml`
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(PLAYTIME_CONFIG_ENV) {
        return PathBuf::from(path);
    }

    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join(CONFIG_FILENAME);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILENAME);
    }

    PathBuf::from("/etc").join(APP_DIR).join(CONFIG_FILENAME)
}

/// Get the default data directory.
///
/// Order of precedence:
/// 1. `$PLAYTIME_DATA_DIR`
/// 2. `$XDG_DATA_HOME/playtime`
/// 3. `~/.local/share/playtime`
pub fn default_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(PLAYTIME_DATA_DIR_ENV) {
        return PathBuf::from(path);
    }

    data_dir_without_env()
}

/// Data directory without the `PLAYTIME_DATA_DIR` override.
pub fn data_dir_without_env() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR);
    }

    PathBuf::from("/tmp").join(APP_DIR).join("data")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_dir_contains_app_name() {
        let path = data_dir_without_env();
        assert!(path.to_string_lossy().contains("playtime"));
    }

    #[test]
    fn config_path_is_toml() {
        let path = default_config_path();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("toml"));
    }
}
