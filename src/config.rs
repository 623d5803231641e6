use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.json";

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("todolist")
}

fn default_collection() -> String {
    "tasks".into()
}

fn default_remember_session() -> bool {
    true
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TodoConfig {
    /// Backend project hosting the task collection.
    #[serde(default)]
    pub project_id: String,
    /// Web API key of the backend project, used for authentication calls.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default)]
    pub debug_logging: bool,
    /// Keep the refresh token in the system keyring between runs.
    #[serde(default = "default_remember_session")]
    pub remember_session: bool,
}

impl Default for TodoConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            api_key: String::new(),
            collection: default_collection(),
            debug_logging: false,
            remember_session: default_remember_session(),
        }
    }
}

impl TodoConfig {
    pub fn default_path() -> PathBuf {
        default_config_dir().join(CONFIG_FILE)
    }

    /// Read the config at `path`. A missing or unreadable file yields defaults.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("Failed to read {}: {}", path.display(), e);
                }
                return Self::default();
            }
        };
        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Ignoring invalid config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    /// Whether enough is configured to reach the backend.
    pub fn backend_ready(&self) -> bool {
        !self.project_id.trim().is_empty() && !self.api_key.trim().is_empty()
    }
}
