//! # Media Services
//!
//! The capability contract every backend adapter implements ([`MediaService`]),
//! plus the pieces adapters are built from:
//!
//! - [`ServiceTokens`]: a service's view of the [`TokenVault`], which is what
//!   "connected" means.
//! - [`client::BackendClient`]: the opaque network capability of one backend.
//! - [`remote::RemoteService`]: a token-backed adapter over any `BackendClient`.
//! - [`spotify`]: the Spotify adapter and its offline client.
//!
//! ## Failure isolation
//!
//! Adapters report failures as [`ServiceError`] values to their immediate caller
//! and never panic on backend errors. The registry treats every service as an
//! independent failure domain: one service failing never disables another.

pub mod client;
pub mod remote;
pub mod spotify;
#[cfg(test)]
pub(crate) mod stub;

use crate::error::{ServiceError, VaultError};
use crate::media::{MediaItem, PlaybackSnapshot, RecommendationContext, ServiceType};
use crate::vault::TokenVault;
use async_trait::async_trait;
use client::TokenGrant;
use std::sync::Arc;

/// Capability interface of a streaming/media backend.
#[async_trait]
pub trait MediaService: Send + Sync {
    /// Stable registry key, e.g. `spotify`.
    fn id(&self) -> &str;

    fn display_name(&self) -> &str;

    fn service_type(&self) -> ServiceType;

    /// Whether a usable token is stored for this service.
    ///
    /// Never fails: a vault read error reads as "not connected".
    async fn is_connected(&self) -> bool;

    /// Start or finish authorization; returns whether the service is connected
    /// when the call returns. May suspend for as long as the user takes.
    async fn connect(&self) -> Result<bool, ServiceError>;

    /// Forget this service's tokens. Disconnecting twice is a no-op.
    async fn disconnect(&self) -> Result<(), ServiceError>;

    /// Backend-side suggestions for `context`; empty when the backend has no signal.
    async fn get_recommendations(
        &self,
        context: &RecommendationContext,
    ) -> Result<Vec<MediaItem>, ServiceError>;

    /// Best-effort playback trigger.
    async fn play(&self, item_id: &str) -> Result<(), ServiceError>;

    /// Live player state, if the backend exposes one.
    async fn playback_state(&self) -> Result<Option<PlaybackSnapshot>, ServiceError> {
        Ok(None)
    }
}

/// One service's slice of the token vault.
#[derive(Clone)]
pub struct ServiceTokens {
    vault: Arc<dyn TokenVault>,
    service_id: String,
}

impl ServiceTokens {
    pub fn new(vault: Arc<dyn TokenVault>, service_id: &str) -> Self {
        Self {
            vault,
            service_id: service_id.to_string(),
        }
    }

    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    /// True when a non-empty access token is stored.
    pub async fn is_connected(&self) -> bool {
        match self.vault.get_token(&self.service_id).await {
            Ok(Some(token)) => !token.is_empty(),
            Ok(None) => false,
            Err(e) => {
                log::warn!("Token lookup for `{}' failed: {e}", self.service_id);
                false
            }
        }
    }

    pub async fn access_token(&self) -> Result<Option<String>, VaultError> {
        Ok(self
            .vault
            .get_token(&self.service_id)
            .await?
            .filter(|t| !t.is_empty()))
    }

    pub async fn refresh_token(&self) -> Result<Option<String>, VaultError> {
        Ok(self
            .vault
            .get_refresh_token(&self.service_id)
            .await?
            .filter(|t| !t.is_empty()))
    }

    /// Store a fresh grant. A grant without a refresh token keeps the old one.
    pub async fn store_grant(&self, grant: &TokenGrant) -> Result<(), VaultError> {
        self.vault
            .set_token(&self.service_id, &grant.access_token)
            .await?;
        if let Some(refresh) = &grant.refresh_token {
            self.vault.set_refresh_token(&self.service_id, refresh).await?;
        }
        Ok(())
    }

    pub async fn forget_refresh_token(&self) -> Result<(), VaultError> {
        self.vault.delete_refresh_token(&self.service_id).await
    }

    /// Remove both tokens. Idempotent.
    pub async fn clear(&self) -> Result<(), VaultError> {
        self.vault.delete_token(&self.service_id).await?;
        self.vault.delete_refresh_token(&self.service_id).await
    }
}
