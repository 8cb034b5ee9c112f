//! Scriptable in-process service used by unit tests.

use super::MediaService;
use crate::error::ServiceError;
use crate::media::{MediaItem, PlaybackSnapshot, RecommendationContext, ServiceType};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

pub(crate) struct StubService {
    id: String,
    items: Vec<MediaItem>,
    pub connected: AtomicBool,
    /// Every call parks forever while set.
    pub hang: AtomicBool,
    /// Every fallible call errors while set.
    pub fail: AtomicBool,
    pub playback: Mutex<Option<PlaybackSnapshot>>,
    pub polls: AtomicUsize,
}

impl StubService {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            items: Vec::new(),
            connected: AtomicBool::new(false),
            hang: AtomicBool::new(false),
            fail: AtomicBool::new(false),
            playback: Mutex::new(None),
            polls: AtomicUsize::new(0),
        }
    }

    pub fn with_items(mut self, titles: &[&str]) -> Self {
        self.items = titles
            .iter()
            .enumerate()
            .map(|(i, title)| MediaItem::track(&self.id, &(i + 1).to_string(), title))
            .collect();
        self
    }

    pub fn connected(self, connected: bool) -> Self {
        self.connected.store(connected, Ordering::SeqCst);
        self
    }

    pub fn set_playback(&self, snapshot: Option<PlaybackSnapshot>) {
        *self.playback.lock().unwrap() = snapshot;
    }

    async fn gate(&self) -> Result<(), ServiceError> {
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ServiceError::unreachable(&self.id, "scripted failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl MediaService for StubService {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.id
    }

    fn service_type(&self) -> ServiceType {
        ServiceType::Music
    }

    async fn is_connected(&self) -> bool {
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> Result<bool, ServiceError> {
        self.gate().await?;
        self.connected.store(true, Ordering::SeqCst);
        Ok(true)
    }

    async fn disconnect(&self) -> Result<(), ServiceError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn get_recommendations(
        &self,
        _context: &RecommendationContext,
    ) -> Result<Vec<MediaItem>, ServiceError> {
        self.gate().await?;
        Ok(self.items.clone())
    }

    async fn play(&self, _item_id: &str) -> Result<(), ServiceError> {
        self.gate().await
    }

    async fn playback_state(&self) -> Result<Option<PlaybackSnapshot>, ServiceError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.gate().await?;
        Ok(self.playback.lock().unwrap().clone())
    }
}
