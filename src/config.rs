use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "config/chat.json";
const MAX_RECENT_PEERS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base WebSocket URL của chat server.
    pub server_url: String,
    pub local_user_id: i64,
    pub local_username: String,
    /// HTTP base của dịch vụ tìm người dùng; không có thì tắt tìm kiếm.
    pub directory_url: Option<String>,
    pub search_path: String,
    pub start_chat_path: String,
    pub search_min_chars: usize,
    pub relay_bind: String,
    pub recent_peers: Vec<i64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:8000".to_string(),
            local_user_id: 1,
            local_username: "me".to_string(),
            directory_url: None,
            search_path: "/search".to_string(),
            start_chat_path: "/start_chat".to_string(),
            search_min_chars: 3,
            relay_bind: "127.0.0.1:8000".to_string(),
            recent_peers: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Địa chỉ kênh cho cuộc trò chuyện với `peer_id`.
    pub fn channel_address(&self, peer_id: i64) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("user_id", &self.local_user_id.to_string())
            .append_pair("username", &self.local_username)
            .finish();
        format!(
            "{}/ws/chat/{peer_id}/?{query}",
            self.server_url.trim_end_matches('/')
        )
    }
}

pub fn load_config(path: &str) -> AppConfig {
    let path = Path::new(path);
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Failed to parse config file {}: {err}", path.display());
                AppConfig::default()
            }
        },
        Err(err) => {
            log::info!(
                "Config file {} not found ({err}); using defaults",
                path.display()
            );
            AppConfig::default()
        }
    }
}

pub fn save_config(path: &str, config: &AppConfig) -> std::io::Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json)
}

/// Đưa peer lên đầu danh sách gần đây và ghi lại file config.
pub fn persist_recent_peer(path: &str, peer_id: i64) -> Vec<i64> {
    let mut config = load_config(path);
    config.recent_peers.retain(|peer| *peer != peer_id);
    config.recent_peers.insert(0, peer_id);
    config.recent_peers.truncate(MAX_RECENT_PEERS);

    if let Err(err) = save_config(path, &config) {
        log::error!("Failed to write config {}: {err}", path);
    } else {
        log::info!("Remembered peer {} in {}", peer_id, path);
    }
    config.recent_peers
}
