//! Token-backed adapter over a [`BackendClient`].
//!
//! Connection state is the presence of an access token in the vault. Connecting
//! tries, in order: an existing access token, a refresh round-trip, and finally
//! full interactive authorization.

use super::client::BackendClient;
use super::{MediaService, ServiceTokens};
use crate::error::ServiceError;
use crate::media::{MediaItem, PlaybackSnapshot, RecommendationContext, ServiceType};
use crate::vault::TokenVault;
use async_trait::async_trait;
use std::sync::Arc;

pub struct RemoteService {
    id: String,
    display_name: String,
    service_type: ServiceType,
    tokens: ServiceTokens,
    client: Arc<dyn BackendClient>,
}

impl RemoteService {
    pub fn new(
        id: &str,
        display_name: &str,
        service_type: ServiceType,
        vault: Arc<dyn TokenVault>,
        client: Arc<dyn BackendClient>,
    ) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            service_type,
            tokens: ServiceTokens::new(vault, id),
            client,
        }
    }

    pub fn tokens(&self) -> &ServiceTokens {
        &self.tokens
    }

    /// Try the stored refresh token. A rejected refresh token is dropped so the
    /// next connect goes straight to authorization.
    async fn try_refresh(&self) -> Result<bool, ServiceError> {
        let Some(refresh) = self.tokens.refresh_token().await? else {
            return Ok(false);
        };

        match self.client.refresh(&refresh).await {
            Ok(grant) => {
                self.tokens.store_grant(&grant).await?;
                log::info!("Refreshed credentials for `{}'", self.id);
                Ok(true)
            }
            Err(e) => {
                log::warn!("Refresh for `{}' failed, re-authorizing: {e}", self.id);
                self.tokens.forget_refresh_token().await?;
                Ok(false)
            }
        }
    }

    async fn require_token(&self) -> Result<String, ServiceError> {
        self.tokens
            .access_token()
            .await?
            .ok_or_else(|| ServiceError::NotConnected {
                service_id: self.id.clone(),
            })
    }
}

#[async_trait]
impl MediaService for RemoteService {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn service_type(&self) -> ServiceType {
        self.service_type
    }

    async fn is_connected(&self) -> bool {
        self.tokens.is_connected().await
    }

    async fn connect(&self) -> Result<bool, ServiceError> {
        if self.tokens.is_connected().await {
            return Ok(true);
        }
        if self.try_refresh().await? {
            return Ok(self.tokens.is_connected().await);
        }

        log::info!("Starting authorization for `{}'", self.id);
        let grant = self.client.authorize().await?;
        self.tokens.store_grant(&grant).await?;
        Ok(self.tokens.is_connected().await)
    }

    async fn disconnect(&self) -> Result<(), ServiceError> {
        self.tokens.clear().await?;
        log::info!("Disconnected `{}'", self.id);
        Ok(())
    }

    async fn get_recommendations(
        &self,
        context: &RecommendationContext,
    ) -> Result<Vec<MediaItem>, ServiceError> {
        // Anonymous fetches are allowed; a vault failure just means no token.
        let token = self.tokens.access_token().await.ok().flatten();
        self.client.fetch_candidates(token.as_deref(), context).await
    }

    async fn play(&self, item_id: &str) -> Result<(), ServiceError> {
        let token = self.require_token().await?;
        self.client.trigger_playback(&token, item_id).await
    }

    async fn playback_state(&self) -> Result<Option<PlaybackSnapshot>, ServiceError> {
        match self.tokens.access_token().await? {
            Some(token) => self.client.now_playing(&token).await,
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::client::TokenGrant;
    use crate::vault::MemoryTokenVault;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct ScriptedClient {
        refresh_ok: bool,
        authorize_calls: AtomicUsize,
        refresh_calls: AtomicUsize,
    }

    #[async_trait]
    impl BackendClient for ScriptedClient {
        async fn authorize(&self) -> Result<TokenGrant, ServiceError> {
            self.authorize_calls.fetch_add(1, Ordering::SeqCst);
            Ok(TokenGrant::new("fresh-access", Some("fresh-refresh")))
        }

        async fn refresh(&self, _refresh_token: &str) -> Result<TokenGrant, ServiceError> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            if self.refresh_ok {
                Ok(TokenGrant::new("refreshed-access", None))
            } else {
                Err(ServiceError::Authorization {
                    service_id: "test".to_string(),
                    reason: "revoked".to_string(),
                })
            }
        }

        async fn fetch_candidates(
            &self,
            access_token: Option<&str>,
            _context: &RecommendationContext,
        ) -> Result<Vec<MediaItem>, ServiceError> {
            let title = if access_token.is_some() { "Personal" } else { "Generic" };
            Ok(vec![MediaItem::track("test", "1", title)])
        }

        async fn trigger_playback(&self, _token: &str, item_id: &str) -> Result<(), ServiceError> {
            if item_id == "missing" {
                return Err(ServiceError::ItemNotFound {
                    service_id: "test".to_string(),
                    item_id: item_id.to_string(),
                });
            }
            Ok(())
        }
    }

    fn service(client: Arc<ScriptedClient>) -> (RemoteService, Arc<MemoryTokenVault>) {
        let vault = Arc::new(MemoryTokenVault::new());
        let service = RemoteService::new("test", "Test", ServiceType::Music, vault.clone(), client);
        (service, vault)
    }

    #[tokio::test]
    async fn test_connect_authorizes_when_no_tokens() {
        let client = Arc::new(ScriptedClient::default());
        let (service, _) = service(client.clone());

        assert!(!service.is_connected().await);
        assert!(service.connect().await.unwrap());
        assert!(service.is_connected().await);
        assert_eq!(client.authorize_calls.load(Ordering::SeqCst), 1);

        // Already connected: no second round-trip.
        assert!(service.connect().await.unwrap());
        assert_eq!(client.authorize_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connect_prefers_refresh() {
        let client = Arc::new(ScriptedClient {
            refresh_ok: true,
            ..Default::default()
        });
        let (service, vault) = service(client.clone());
        vault.set_refresh_token("test", "old-refresh").await.unwrap();

        assert!(service.connect().await.unwrap());
        assert_eq!(client.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.authorize_calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            vault.get_token("test").await.unwrap().as_deref(),
            Some("refreshed-access")
        );
    }

    #[tokio::test]
    async fn test_rejected_refresh_falls_back_to_authorize() {
        let client = Arc::new(ScriptedClient::default());
        let (service, vault) = service(client.clone());
        vault.set_refresh_token("test", "revoked").await.unwrap();

        assert!(service.connect().await.unwrap());
        assert_eq!(client.authorize_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            vault.get_refresh_token("test").await.unwrap().as_deref(),
            Some("fresh-refresh")
        );
    }

    #[tokio::test]
    async fn test_disconnect_twice_matches_once() {
        let (service, vault) = service(Arc::new(ScriptedClient::default()));
        service.connect().await.unwrap();

        service.disconnect().await.unwrap();
        let after_once = vault.entries().await;
        service.disconnect().await.unwrap();

        assert_eq!(vault.entries().await, after_once);
        assert!(!service.is_connected().await);
    }

    #[tokio::test]
    async fn test_play_requires_connection() {
        let (service, _) = service(Arc::new(ScriptedClient::default()));
        assert!(matches!(
            service.play("1").await,
            Err(ServiceError::NotConnected { .. })
        ));

        service.connect().await.unwrap();
        service.play("1").await.unwrap();
        assert!(matches!(
            service.play("missing").await,
            Err(ServiceError::ItemNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_recommendations_work_anonymously() {
        let (service, _) = service(Arc::new(ScriptedClient::default()));
        let ctx = RecommendationContext::default();
        assert_eq!(service.get_recommendations(&ctx).await.unwrap()[0].title, "Generic");

        service.connect().await.unwrap();
        assert_eq!(service.get_recommendations(&ctx).await.unwrap()[0].title, "Personal");
    }
}
