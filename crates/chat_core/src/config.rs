use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::paths::config_json_path;

pub const DEFAULT_API_BASE: &str = "http://localhost:8000/api";
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_MAX_HISTORY: usize = 50;

const CONFIG_FILE_PATH: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: Option<String>,
    /// Path of the non-streaming chat endpoint, relative to `api_base`.
    pub chat_path: String,
    /// Path of the streaming chat endpoint, relative to `api_base`.
    pub stream_path: String,
    pub http_proxy: String,
    pub https_proxy: String,
    pub http_proxy_auth: Option<ProxyAuth>,
    pub https_proxy_auth: Option<ProxyAuth>,
    pub request_timeout_secs: Option<u64>,
    pub max_retries: u32,
    pub max_history: usize,
    /// Move from `error` to `retrying` automatically after a failed exchange.
    pub auto_retry: bool,
    /// Re-issue the request automatically once in `retrying`.
    pub auto_resend: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyAuth {
    pub username: String,
    pub password: String,
}

pub fn parse_bool_env(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            model: None,
            chat_path: "/chat".to_string(),
            stream_path: "/chat/stream".to_string(),
            http_proxy: String::new(),
            https_proxy: String::new(),
            http_proxy_auth: None,
            https_proxy_auth: None,
            request_timeout_secs: None,
            max_retries: DEFAULT_MAX_RETRIES,
            max_history: DEFAULT_MAX_HISTORY,
            auto_retry: true,
            auto_resend: false,
        }
    }
}

impl Config {
    /// Load from `~/.ragchat/config.json`, falling back to `./config.toml`,
    /// then apply environment overrides.
    pub fn new() -> Self {
        let mut config = Self::load_from(&config_json_path(), Path::new(CONFIG_FILE_PATH));
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Read the first config file that exists and parses; defaults otherwise.
    pub fn load_from(json_path: &Path, toml_path: &Path) -> Self {
        if json_path.exists() {
            match std::fs::read_to_string(json_path) {
                Ok(content) => match serde_json::from_str::<Config>(&content) {
                    Ok(config) => return config,
                    Err(e) => log::warn!("Ignoring malformed {}: {}", json_path.display(), e),
                },
                Err(e) => log::warn!("Failed to read {}: {}", json_path.display(), e),
            }
        }

        if toml_path.exists() {
            match std::fs::read_to_string(toml_path) {
                Ok(content) => match toml::from_str::<Config>(&content) {
                    Ok(config) => return config,
                    Err(e) => log::warn!("Ignoring malformed {}: {}", toml_path.display(), e),
                },
                Err(e) => log::warn!("Failed to read {}: {}", toml_path.display(), e),
            }
        }

        Self::default()
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(api_base) = lookup("API_BASE") {
            self.api_base = api_base;
        }
        if let Some(api_key) = lookup("API_KEY") {
            self.api_key = Some(api_key);
        }
        if let Some(model) = lookup("MODEL") {
            self.model = Some(model);
        }
        if let Some(http_proxy) = lookup("HTTP_PROXY") {
            self.http_proxy = http_proxy;
        }
        if let Some(https_proxy) = lookup("HTTPS_PROXY") {
            self.https_proxy = https_proxy;
        }
        if let Some(value) = lookup("RAGCHAT_MAX_RETRIES") {
            match value.trim().parse() {
                Ok(max_retries) => self.max_retries = max_retries,
                Err(_) => log::warn!("Ignoring invalid RAGCHAT_MAX_RETRIES={value:?}"),
            }
        }
        if let Some(value) = lookup("RAGCHAT_TIMEOUT_SECS") {
            match value.trim().parse() {
                Ok(secs) => self.request_timeout_secs = Some(secs),
                Err(_) => log::warn!("Ignoring invalid RAGCHAT_TIMEOUT_SECS={value:?}"),
            }
        }
        if let Some(value) = lookup("RAGCHAT_AUTO_RETRY") {
            self.auto_retry = parse_bool_env(&value);
        }
        if let Some(value) = lookup("RAGCHAT_AUTO_RESEND") {
            self.auto_resend = parse_bool_env(&value);
        }
    }

    /// Full URL of the non-streaming endpoint.
    pub fn chat_url(&self) -> String {
        join_url(&self.api_base, &self.chat_path)
    }

    /// Full URL of the streaming endpoint.
    pub fn stream_url(&self) -> String {
        join_url(&self.api_base, &self.stream_path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
