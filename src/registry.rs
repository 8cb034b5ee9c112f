//! # Service Registry
//!
//! Catalog of registered [`MediaService`] adapters, keyed by id and kept in
//! registration order. Two views of the same catalog are exposed:
//!
//! - **Imperative**: [`ServiceRegistry::get`], [`ServiceRegistry::get_all`] and
//!   [`ServiceRegistry::active`] for code outside any reactive lifecycle
//!   (background sync, command handlers).
//! - **Reactive**: [`ServiceRegistry::subscribe`] hands out a
//!   [`tokio::sync::watch::Receiver`] of [`RegistrySnapshot`]s for surfaces that
//!   want to re-read on change without polling.
//!
//! Every mutation publishes the new snapshot while still holding the catalog's
//! write lock, so the two views never disagree.
//!
//! ## Failure isolation
//!
//! Broadcast queries ([`ServiceRegistry::any_connected`],
//! [`ServiceRegistry::connection_report`]) bound each service's call by the
//! configured timeout. A hung service reads as "not connected" and never delays
//! the verdict for the services after it beyond that bound.

use crate::error::ServiceError;
use crate::media::ServiceType;
use crate::services::MediaService;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::watch;

/// Default bound on a single broadcast call.
pub const DEFAULT_SERVICE_TIMEOUT: Duration = Duration::from_secs(10);

/// Published view of the catalog.
#[derive(Clone, Default)]
pub struct RegistrySnapshot {
    /// Services in registration order.
    pub services: Vec<Arc<dyn MediaService>>,
    /// Explicitly selected active service, if any.
    pub active: Option<String>,
    /// Bumped on every mutation.
    pub revision: u64,
}

impl RegistrySnapshot {
    pub fn ids(&self) -> Vec<&str> {
        self.services.iter().map(|s| s.id()).collect()
    }
}

impl fmt::Debug for RegistrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrySnapshot")
            .field("services", &self.ids())
            .field("active", &self.active)
            .field("revision", &self.revision)
            .finish()
    }
}

/// One row of [`ServiceRegistry::connection_report`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub id: String,
    pub display_name: String,
    pub service_type: ServiceType,
    pub connected: bool,
}

#[derive(Default)]
struct Catalog {
    order: Vec<String>,
    services: HashMap<String, Arc<dyn MediaService>>,
    active: Option<String>,
    revision: u64,
}

impl Catalog {
    fn ordered(&self) -> Vec<Arc<dyn MediaService>> {
        self.order
            .iter()
            .filter_map(|id| self.services.get(id).cloned())
            .collect()
    }

    fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            services: self.ordered(),
            active: self.active.clone(),
            revision: self.revision,
        }
    }
}

pub struct ServiceRegistry {
    catalog: RwLock<Catalog>,
    tx: watch::Sender<RegistrySnapshot>,
    service_timeout: Duration,
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::with_service_timeout(DEFAULT_SERVICE_TIMEOUT)
    }

    pub fn with_service_timeout(service_timeout: Duration) -> Self {
        let (tx, _rx) = watch::channel(RegistrySnapshot::default());
        Self {
            catalog: RwLock::new(Catalog::default()),
            tx,
            service_timeout,
        }
    }

    pub fn service_timeout(&self) -> Duration {
        self.service_timeout
    }

    // A panic while holding the lock cannot leave the catalog half-written,
    // so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, Catalog> {
        self.catalog.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Catalog> {
        self.catalog.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, catalog: &mut Catalog) {
        catalog.revision += 1;
        self.tx.send_replace(catalog.snapshot());
    }

    /// Insert `service`, replacing any service with the same id in place.
    pub fn register(&self, service: Arc<dyn MediaService>) {
        let id = service.id().to_string();
        let mut catalog = self.write();

        if catalog.services.insert(id.clone(), service).is_some() {
            log::info!("Replaced service `{id}'");
        } else {
            log::info!("Registered service `{id}'");
            catalog.order.push(id);
        }
        self.publish(&mut catalog);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn MediaService>> {
        self.read().services.get(id).cloned()
    }

    /// All services in registration order.
    pub fn get_all(&self) -> Vec<Arc<dyn MediaService>> {
        self.read().ordered()
    }

    pub fn ids(&self) -> Vec<String> {
        self.read().order.clone()
    }

    pub fn len(&self) -> usize {
        self.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Select the service used by the poller and the engine fallback.
    ///
    /// Returns `false`, leaving the selection unchanged, for an unknown id.
    pub fn set_active(&self, id: &str) -> bool {
        let mut catalog = self.write();
        if !catalog.services.contains_key(id) {
            log::warn!("Cannot activate unregistered service `{id}'");
            return false;
        }
        catalog.active = Some(id.to_string());
        self.publish(&mut catalog);
        true
    }

    /// The selected service, or the first registered one.
    pub fn active(&self) -> Option<Arc<dyn MediaService>> {
        let catalog = self.read();
        let id = catalog.active.as_ref().or_else(|| catalog.order.first())?;
        catalog.services.get(id).cloned()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RegistrySnapshot> {
        self.tx.subscribe()
    }

    async fn probe(&self, service: &dyn MediaService) -> bool {
        match tokio::time::timeout(self.service_timeout, service.is_connected()).await {
            Ok(connected) => connected,
            Err(_) => {
                let err = ServiceError::timeout(service.id(), self.service_timeout);
                log::warn!("Connection check failed: {err}");
                false
            }
        }
    }

    /// Whether any registered service currently holds a connection.
    pub async fn any_connected(&self) -> bool {
        for service in self.get_all() {
            if self.probe(service.as_ref()).await {
                return true;
            }
        }
        false
    }

    /// Connection state of every service, in registration order.
    pub async fn connection_report(&self) -> Vec<ConnectionStatus> {
        let mut report = Vec::new();
        for service in self.get_all() {
            let connected = self.probe(service.as_ref()).await;
            report.push(ConnectionStatus {
                id: service.id().to_string(),
                display_name: service.display_name().to_string(),
                service_type: service.service_type(),
                connected,
            });
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::stub::StubService;
    use std::sync::atomic::Ordering;

    fn stub(id: &str) -> Arc<StubService> {
        Arc::new(StubService::new(id))
    }

    #[test]
    fn test_register_and_get() {
        let registry = ServiceRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get("spotify").is_none());

        registry.register(stub("spotify"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("spotify").unwrap().id(), "spotify");
    }

    #[test]
    fn test_overwrite_keeps_position_and_latest_instance() {
        let registry = ServiceRegistry::new();
        let replacement = stub("a");
        registry.register(stub("a"));
        registry.register(stub("b"));
        registry.register(replacement.clone());

        assert_eq!(registry.ids(), vec!["a", "b"]);
        let current = registry.get("a").unwrap();
        let expected: Arc<dyn MediaService> = replacement;
        assert!(Arc::ptr_eq(&current, &expected));
    }

    #[test]
    fn test_len_matches_distinct_ids_for_any_sequence() {
        let registry = ServiceRegistry::new();
        let sequence = ["a", "b", "a", "c", "b", "b", "d", "a"];
        let mut latest: HashMap<&str, Arc<StubService>> = HashMap::new();

        for (step, &id) in sequence.iter().enumerate() {
            let service = stub(id);
            latest.insert(id, service.clone());
            registry.register(service);

            let distinct: std::collections::HashSet<_> = sequence[..=step].iter().collect();
            assert_eq!(registry.get_all().len(), distinct.len());
        }
        for (id, service) in latest {
            let expected: Arc<dyn MediaService> = service;
            assert!(Arc::ptr_eq(&registry.get(id).unwrap(), &expected));
        }
    }

    #[test]
    fn test_active_defaults_to_first_registered() {
        let registry = ServiceRegistry::new();
        assert!(registry.active().is_none());

        registry.register(stub("a"));
        registry.register(stub("b"));
        assert_eq!(registry.active().unwrap().id(), "a");

        assert!(registry.set_active("b"));
        assert_eq!(registry.active().unwrap().id(), "b");

        assert!(!registry.set_active("nope"));
        assert_eq!(registry.active().unwrap().id(), "b");
    }

    #[tokio::test]
    async fn test_subscribers_see_registration() {
        let registry = ServiceRegistry::new();
        let mut rx = registry.subscribe();
        assert_eq!(rx.borrow().revision, 0);

        registry.register(stub("spotify"));
        rx.changed().await.unwrap();
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.ids(), vec!["spotify"]);
        assert_eq!(snapshot.revision, 1);

        // The imperative view agrees with the published one.
        assert_eq!(registry.snapshot().revision, snapshot.revision);
        assert_eq!(registry.ids(), vec!["spotify"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_service_does_not_block_broadcast() {
        let registry = ServiceRegistry::with_service_timeout(Duration::from_millis(100));
        let hung = stub("hung");
        hung.hang.store(true, Ordering::SeqCst);
        registry.register(hung);
        registry.register(Arc::new(StubService::new("ok").connected(true)));

        assert!(registry.any_connected().await);

        let report = registry.connection_report().await;
        assert_eq!(report.len(), 2);
        assert!(!report[0].connected);
        assert!(report[1].connected);
    }

    #[tokio::test]
    async fn test_any_connected_false_when_none() {
        let registry = ServiceRegistry::new();
        assert!(!registry.any_connected().await);
        registry.register(stub("a"));
        assert!(!registry.any_connected().await);
    }
}
