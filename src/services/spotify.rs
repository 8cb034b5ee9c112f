//! Spotify adapter.
//!
//! [`SpotifyService`] is a [`RemoteService`] registered under [`SPOTIFY_ID`]. The
//! HTTP client is injected; [`OfflineSpotifyClient`] answers from a fixed
//! catalogue so the rest of the system works without network access.

use super::client::{BackendClient, TokenGrant};
use super::remote::RemoteService;
use crate::error::ServiceError;
use crate::media::{MediaItem, RecommendationContext, ServiceType};
use crate::vault::TokenVault;
use async_trait::async_trait;
use std::sync::Arc;

pub const SPOTIFY_ID: &str = "spotify";

pub type SpotifyService = RemoteService;

/// Build the Spotify adapter over `client`.
pub fn spotify_service(
    vault: Arc<dyn TokenVault>,
    client: Arc<dyn BackendClient>,
) -> SpotifyService {
    RemoteService::new(SPOTIFY_ID, "Spotify", ServiceType::Music, vault, client)
}

/// Spotify adapter that never touches the network.
pub fn offline_spotify_service(vault: Arc<dyn TokenVault>) -> SpotifyService {
    spotify_service(vault, Arc::new(OfflineSpotifyClient::new()))
}

/// Canned client: one calming track, no authorization.
#[derive(Debug, Clone)]
pub struct OfflineSpotifyClient {
    catalogue: Vec<MediaItem>,
}

impl Default for OfflineSpotifyClient {
    fn default() -> Self {
        Self::new()
    }
}

impl OfflineSpotifyClient {
    pub fn new() -> Self {
        Self {
            catalogue: vec![MediaItem::track(SPOTIFY_ID, "1", "Calming Song")
                .with_artist("Relaxing Artist")],
        }
    }

    fn offline(&self) -> ServiceError {
        ServiceError::Authorization {
            service_id: SPOTIFY_ID.to_string(),
            reason: "authorization is unavailable offline".to_string(),
        }
    }
}

#[async_trait]
impl BackendClient for OfflineSpotifyClient {
    async fn authorize(&self) -> Result<TokenGrant, ServiceError> {
        Err(self.offline())
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenGrant, ServiceError> {
        Err(self.offline())
    }

    async fn fetch_candidates(
        &self,
        _access_token: Option<&str>,
        context: &RecommendationContext,
    ) -> Result<Vec<MediaItem>, ServiceError> {
        let limit = context.limit.unwrap_or(self.catalogue.len());
        Ok(self.catalogue.iter().take(limit).cloned().collect())
    }

    async fn trigger_playback(
        &self,
        _access_token: &str,
        item_id: &str,
    ) -> Result<(), ServiceError> {
        if self.catalogue.iter().any(|item| item.id == item_id) {
            log::debug!("Offline playback of `{item_id}'");
            Ok(())
        } else {
            Err(ServiceError::ItemNotFound {
                service_id: SPOTIFY_ID.to_string(),
                item_id: item_id.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::MediaService;
    use crate::vault::MemoryTokenVault;

    #[tokio::test]
    async fn test_offline_service_identity() {
        let service = offline_spotify_service(Arc::new(MemoryTokenVault::new()));
        assert_eq!(service.id(), "spotify");
        assert_eq!(service.display_name(), "Spotify");
        assert_eq!(service.service_type(), ServiceType::Music);
        assert!(!service.is_connected().await);
    }

    #[tokio::test]
    async fn test_offline_recommendations_without_connection() {
        let service = offline_spotify_service(Arc::new(MemoryTokenVault::new()));
        let items = service
            .get_recommendations(&RecommendationContext::default())
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "1");
        assert_eq!(items[0].title, "Calming Song");
        assert_eq!(items[0].uri, "spotify:track:1");
    }

    #[tokio::test]
    async fn test_offline_connect_reports_failure() {
        let service = offline_spotify_service(Arc::new(MemoryTokenVault::new()));
        assert!(matches!(
            service.connect().await,
            Err(ServiceError::Authorization { .. })
        ));
        assert!(!service.is_connected().await);
    }

    #[tokio::test]
    async fn test_offline_play_with_stored_token() {
        let vault = Arc::new(MemoryTokenVault::new());
        vault.set_token(SPOTIFY_ID, "token").await.unwrap();
        let service = offline_spotify_service(vault);

        assert!(service.connect().await.unwrap());
        service.play("1").await.unwrap();
        assert!(service.play("42").await.is_err());
    }
}
