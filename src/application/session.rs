use std::fmt;
use std::sync::Arc;

use super::{AppError, AppResult};
use crate::ports::{AppConfig, ConfigStore};

/// Authenticated session threaded into every API request.
///
/// Hydrated once at startup and cleared on sign-out; there is no global
/// token state.
#[derive(Clone)]
pub struct Session {
    token: Arc<str>,
}

impl Session {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Arc::from(token.into()),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Loads the configuration and resolves the session token. An explicit
    /// token (flag or environment) takes precedence and is persisted.
    pub async fn hydrate(
        store: &dyn ConfigStore,
        explicit_token: Option<String>,
    ) -> AppResult<(Session, AppConfig)> {
        let mut config = store.load_config().await?;

        if let Some(token) = explicit_token.filter(|t| !t.trim().is_empty()) {
            let token = token.trim().to_string();
            if config.api_token.as_deref() != Some(token.as_str()) {
                store.set_api_token(&token).await?;
                tracing::info!("Stored new API token");
            }
            config.api_token = Some(token);
        }

        let token = config
            .api_token
            .clone()
            .ok_or(AppError::AuthenticationRequired)?;

        Ok((Session::new(token), config))
    }

    pub async fn sign_out(store: &dyn ConfigStore) -> AppResult<()> {
        store.clear_api_token().await?;
        tracing::info!("Signed out, stored token removed");
        Ok(())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("token", &"<redacted>").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::MockConfigStore;

    #[tokio::test]
    async fn stored_token_is_used() {
        let mut store = MockConfigStore::new();
        store.expect_load_config().returning(|| {
            Ok(AppConfig {
                api_token: Some("stored".to_string()),
                ..Default::default()
            })
        });
        store.expect_set_api_token().never();

        let (session, _) = Session::hydrate(&store, None).await.unwrap();
        assert_eq!(session.token(), "stored");
    }

    #[tokio::test]
    async fn explicit_token_is_persisted() {
        let mut store = MockConfigStore::new();
        store.expect_load_config().returning(|| Ok(AppConfig::default()));
        store
            .expect_set_api_token()
            .withf(|token| token == "fresh")
            .times(1)
            .returning(|_| Ok(()));

        let (session, config) = Session::hydrate(&store, Some(" fresh ".to_string()))
            .await
            .unwrap();
        assert_eq!(session.token(), "fresh");
        assert_eq!(config.api_token.as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn missing_token_requires_authentication() {
        let mut store = MockConfigStore::new();
        store.expect_load_config().returning(|| Ok(AppConfig::default()));

        let err = Session::hydrate(&store, None).await.unwrap_err();
        assert_eq!(err, AppError::AuthenticationRequired);
    }

    #[tokio::test]
    async fn sign_out_clears_token() {
        let mut store = MockConfigStore::new();
        store.expect_clear_api_token().times(1).returning(|| Ok(()));
        tokio_test::assert_ok!(Session::sign_out(&store).await);
    }

    #[test]
    fn debug_output_hides_token() {
        let rendered = format!("{:?}", Session::new("super-secret"));
        assert!(!rendered.contains("super-secret"));
    }
}
