use crate::{
    domain::ProjectId,
    ports::{AppConfig, ConfigError, ConfigResult, ConfigStore},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

const APP_DIR: &str = "sitetrack-cli";
const TOKEN_ENV: &str = "SITETRACK_TOKEN";

#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfigFile {
    api_base_url: Option<String>,
    default_project: Option<String>,
    cache_ttl_seconds: Option<u64>,
    chat_poll_interval_secs: Option<u64>,
}

/// JSON config under the user config dir; the API token lives in the OS
/// keyring with a `.token` file fallback.
pub struct FileConfigStore {
    config_path: PathBuf,
    keyring_service: Option<String>,
}

impl FileConfigStore {
    pub fn new() -> ConfigResult<Self> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            ConfigError::ReadError("Cannot determine config directory".to_string())
        })?;

        Ok(Self {
            config_path: config_dir.join(APP_DIR).join("config.json"),
            keyring_service: Some(APP_DIR.to_string()),
        })
    }

    /// File-only store rooted at `dir`; never touches the keyring.
    #[cfg(test)]
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            config_path: dir.into().join("config.json"),
            keyring_service: None,
        }
    }

    fn config_dir(&self) -> PathBuf {
        self.config_path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    async fn ensure_config_dir(&self) -> ConfigResult<()> {
        fs::create_dir_all(self.config_dir())
            .await
            .map_err(|e| ConfigError::WriteError(e.to_string()))
    }

    fn token_file_path(&self) -> PathBuf {
        self.config_dir().join(".token")
    }

    fn keyring_entry(&self) -> Option<keyring::Entry> {
        let service = self.keyring_service.as_ref()?;
        match keyring::Entry::new(service, "api_token") {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Keyring service not available, falling back to file storage: {}", e);
                None
            }
        }
    }

    async fn get_token_from_file(&self) -> ConfigResult<Option<String>> {
        match fs::read_to_string(self.token_file_path()).await {
            Ok(token) if !token.trim().is_empty() => Ok(Some(token.trim().to_string())),
            _ => Ok(None),
        }
    }

    async fn set_token_in_file(&self, token: &str) -> ConfigResult<()> {
        self.ensure_config_dir().await?;
        let token_path = self.token_file_path();
        fs::write(&token_path, token)
            .await
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&token_path, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }

        Ok(())
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn load_config(&self) -> ConfigResult<AppConfig> {
        let config_file = match fs::read_to_string(&self.config_path).await {
            Ok(content) => serde_json::from_str::<ConfigFile>(&content)
                .map_err(|e| ConfigError::InvalidFormat(e.to_string()))?,
            Err(_) => ConfigFile::default(),
        };

        let mut api_token = self.get_api_token().await?;
        if api_token.is_none() {
            api_token = std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty());
        }

        let defaults = AppConfig::default();
        Ok(AppConfig {
            api_token,
            api_base_url: config_file.api_base_url.unwrap_or(defaults.api_base_url),
            default_project: config_file.default_project.map(ProjectId),
            cache_ttl_seconds: config_file
                .cache_ttl_seconds
                .unwrap_or(defaults.cache_ttl_seconds),
            chat_poll_interval_secs: config_file
                .chat_poll_interval_secs
                .unwrap_or(defaults.chat_poll_interval_secs),
        })
    }

    async fn save_config(&self, config: &AppConfig) -> ConfigResult<()> {
        self.ensure_config_dir().await?;

        let config_file = ConfigFile {
            api_base_url: Some(config.api_base_url.clone()),
            default_project: config.default_project.as_ref().map(|p| p.0.clone()),
            cache_ttl_seconds: Some(config.cache_ttl_seconds),
            chat_poll_interval_secs: Some(config.chat_poll_interval_secs),
        };

        let content = serde_json::to_string_pretty(&config_file)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        fs::write(&self.config_path, content)
            .await
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        if let Some(token) = &config.api_token {
            self.set_api_token(token).await?;
        }

        Ok(())
    }

    async fn get_api_token(&self) -> ConfigResult<Option<String>> {
        if let Some(entry) = self.keyring_entry() {
            match entry.get_password() {
                Ok(token) => return Ok(Some(token)),
                Err(keyring::Error::NoEntry) => {}
                Err(e) => tracing::warn!("Keyring read failed, falling back to file storage: {}", e),
            }
        }

        self.get_token_from_file().await
    }

    async fn set_api_token(&self, token: &str) -> ConfigResult<()> {
        if let Some(entry) = self.keyring_entry() {
            match entry.set_password(token) {
                Ok(()) => return Ok(()),
                Err(e) => tracing::warn!("Failed to store in keyring, falling back to file storage: {}", e),
            }
        }

        self.set_token_in_file(token).await
    }

    async fn clear_api_token(&self) -> ConfigResult<()> {
        if let Some(entry) = self.keyring_entry() {
            match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => {}
                Err(e) => tracing::warn!("Failed to remove keyring entry: {}", e),
            }
        }

        match fs::remove_file(self.token_file_path()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ConfigError::WriteError(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (FileConfigStore, PathBuf) {
        let dir = std::env::temp_dir().join(format!("sitetrack-test-{}", uuid::Uuid::new_v4()));
        (FileConfigStore::with_dir(&dir), dir)
    }

    #[tokio::test]
    async fn save_and_load_round_trip() {
        let (store, dir) = temp_store();
        let config = AppConfig {
            api_token: Some("secret".to_string()),
            api_base_url: "https://build.example/api".to_string(),
            default_project: Some("p9".into()),
            cache_ttl_seconds: 30,
            chat_poll_interval_secs: 5,
        };

        store.save_config(&config).await.unwrap();
        let loaded = store.load_config().await.unwrap();
        assert_eq!(loaded, config);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn clearing_token_is_idempotent() {
        let (store, dir) = temp_store();
        store.set_api_token("secret").await.unwrap();
        assert_eq!(store.get_api_token().await.unwrap().as_deref(), Some("secret"));

        store.clear_api_token().await.unwrap();
        store.clear_api_token().await.unwrap();
        assert_eq!(store.get_api_token().await.unwrap(), None);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn malformed_config_is_reported() {
        let (store, dir) = temp_store();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.json"), "{ not json").unwrap();

        assert!(matches!(
            store.load_config().await,
            Err(ConfigError::InvalidFormat(_))
        ));

        let _ = std::fs::remove_dir_all(dir);
    }
}
