use crate::domain::ProjectId;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    ReadError(String),

    #[error("Failed to write configuration: {0}")]
    WriteError(String),

    #[error("Invalid configuration format: {0}")]
    InvalidFormat(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub api_token: Option<String>,
    pub api_base_url: String,
    pub default_project: Option<ProjectId>,
    pub cache_ttl_seconds: u64,
    pub chat_poll_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            default_project: None,
            cache_ttl_seconds: 300, // 5 minutes
            chat_poll_interval_secs: 3,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn load_config(&self) -> ConfigResult<AppConfig>;
    async fn save_config(&self, config: &AppConfig) -> ConfigResult<()>;
    async fn get_api_token(&self) -> ConfigResult<Option<String>>;
    async fn set_api_token(&self, token: &str) -> ConfigResult<()>;
    async fn clear_api_token(&self) -> ConfigResult<()>;
}
