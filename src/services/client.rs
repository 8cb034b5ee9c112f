//! Network capability of a single backend.
//!
//! The core never speaks a backend's REST API itself. Each adapter is handed a
//! [`BackendClient`] and treats its latency and failure modes as unpredictable;
//! timeouts are applied by the caller (registry broadcast, engine fallback,
//! session poller).

use crate::error::ServiceError;
use crate::media::{MediaItem, PlaybackSnapshot, RecommendationContext};
use async_trait::async_trait;

/// Credentials returned by an authorization or refresh round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl TokenGrant {
    pub fn new(access_token: &str, refresh_token: Option<&str>) -> Self {
        Self {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.map(str::to_string),
        }
    }
}

#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Full interactive authorization. May wait on the user indefinitely.
    async fn authorize(&self) -> Result<TokenGrant, ServiceError>;

    /// Exchange a refresh token for a new grant.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, ServiceError>;

    /// Candidate items for `context`. Unauthenticated calls pass `None`.
    async fn fetch_candidates(
        &self,
        access_token: Option<&str>,
        context: &RecommendationContext,
    ) -> Result<Vec<MediaItem>, ServiceError>;

    async fn trigger_playback(&self, access_token: &str, item_id: &str)
        -> Result<(), ServiceError>;

    async fn now_playing(
        &self,
        _access_token: &str,
    ) -> Result<Option<PlaybackSnapshot>, ServiceError> {
        Ok(None)
    }
}
