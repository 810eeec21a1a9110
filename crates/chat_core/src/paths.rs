use std::path::PathBuf;

/// Application directory (~/.ragchat)
pub fn app_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".ragchat")
}

/// Path of the JSON configuration file
pub fn config_json_path() -> PathBuf {
    app_dir().join("config.json")
}
