//! Configuration management

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Separate EPG source; empty means `{server}/xmltv.php`.
    #[serde(default)]
    pub epg_url: String,
    /// Apply the timezone offset suffix of EPG timestamps. Turn off for
    /// providers whose offsets are wrong.
    #[serde(default = "default_true")]
    pub apply_epg_offset: bool,
    #[serde(default = "default_player")]
    pub external_player: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_true() -> bool {
    true
}

fn default_player() -> String {
    "mpv".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            username: String::new(),
            password: String::new(),
            epg_url: String::new(),
            apply_epg_offset: true,
            external_player: default_player(),
            user_agent: default_user_agent(),
        }
    }
}

impl AppConfig {
    fn config_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("streamview");
        fs::create_dir_all(&path).ok();
        path.push("config.json");
        path
    }

    pub fn load() -> Self {
        let path = Self::config_path();

        if path.exists() {
            if let Ok(content) = fs::read_to_string(&path) {
                if let Ok(config) = serde_json::from_str(&content) {
                    return config;
                }
            }
        }

        Self::default()
    }

    pub fn save(&self) {
        let path = Self::config_path();
        if let Ok(content) = serde_json::to_string_pretty(self) {
            let _ = fs::write(path, content);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "server": "http://tv.example.com" }"#).unwrap();
        assert_eq!(config.server, "http://tv.example.com");
        assert_eq!(config.external_player, "mpv");
        assert!(config.apply_epg_offset);
        assert!(config.username.is_empty());
    }

    #[test]
    fn round_trips_through_json() {
        let mut config = AppConfig::default();
        config.server = "http://tv.example.com".to_string();
        config.username = "john".to_string();
        config.apply_epg_offset = false;

        let json = serde_json::to_string(&config).unwrap();
        let back: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.server, config.server);
        assert_eq!(back.username, config.username);
        assert!(!back.apply_epg_offset);
    }
}
