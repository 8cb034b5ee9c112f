//! # Session Sync
//!
//! [`SessionSyncStore`] is the single owner of periodic playback polling. Any
//! number of surfaces may ask for syncing; exactly one tick task runs while at
//! least one of them is still interested.
//!
//! ## State machine
//!
//! ```text
//!   Idle ──start()──▶ Active ──stop() (owners → 0)──▶ Idle
//!                      │  ▲
//!                      └──┘ start() / stop() with owners > 0: no timer change
//! ```
//!
//! ## Stale ticks
//!
//! Every transition bumps a generation counter. The tick task remembers the
//! generation it was spawned under and its results are dropped unless that
//! generation is still current, so a tick finishing after `stop()` can never
//! reactivate the session.
//!
//! ## Failures
//!
//! A tick that errors or exceeds the tick timeout leaves state unchanged. The
//! timer keeps running; the next tick is the only retry.

use crate::error::{ServiceError, SyncError};
use crate::media::PlaybackSnapshot;
use crate::registry::ServiceRegistry;
use crate::services::MediaService;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_millis(1000);
pub const DEFAULT_TICK_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared session state. Written only by the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub is_active: bool,
    pub label: String,
    pub start_time: Option<DateTime<Utc>>,
    pub progress_ms: u64,
    /// Connection state of the polled service at the last good tick.
    pub connected: bool,
    pub service_id: Option<String>,
    pub now_playing: Option<PlaybackSnapshot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    pub interval: Duration,
    pub tick_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SYNC_INTERVAL,
            tick_timeout: DEFAULT_TICK_TIMEOUT,
        }
    }
}

/// What one successful poll observed.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct TickUpdate {
    pub service_id: Option<String>,
    pub connected: bool,
    pub now_playing: Option<PlaybackSnapshot>,
}

struct Timer {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Control {
    owners: usize,
    generation: u64,
    timer: Option<Timer>,
}

struct Inner {
    registry: Arc<ServiceRegistry>,
    config: SyncConfig,
    control: Mutex<Control>,
    state_tx: watch::Sender<SessionState>,
    running: Arc<AtomicUsize>,
}

impl Inner {
    fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `update` if it was produced under the current generation.
    fn apply(&self, generation: u64, update: TickUpdate) -> bool {
        let control = self.control();
        if control.generation != generation || control.timer.is_none() {
            log::trace!("Dropping tick from generation {generation}");
            return false;
        }

        self.state_tx.send_modify(|state| {
            state.progress_ms = match &update.now_playing {
                Some(playing) => playing.progress_ms,
                None => elapsed_ms(state.start_time),
            };
            state.connected = update.connected;
            state.service_id = update.service_id;
            state.now_playing = update.now_playing;
        });
        true
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let control = self.control.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(timer) = control.timer.take() {
            timer.token.cancel();
            timer.handle.abort();
        }
    }
}

fn elapsed_ms(start_time: Option<DateTime<Utc>>) -> u64 {
    start_time
        .map(|start| (Utc::now() - start).num_milliseconds().max(0) as u64)
        .unwrap_or(0)
}

/// Decrements the live task count when the tick task ends, however it ends.
struct TaskGuard(Arc<AtomicUsize>);

impl TaskGuard {
    fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Reference-counted owner of the playback poll timer.
#[derive(Clone)]
pub struct SessionSyncStore {
    inner: Arc<Inner>,
}

impl SessionSyncStore {
    pub fn new(registry: Arc<ServiceRegistry>, config: SyncConfig) -> Self {
        let (state_tx, _rx) = watch::channel(SessionState::default());
        Self {
            inner: Arc::new(Inner {
                registry,
                config,
                control: Mutex::new(Control::default()),
                state_tx,
                running: Arc::new(AtomicUsize::new(0)),
            }),
        }
    }

    /// Register interest in syncing under `label`.
    ///
    /// The first owner starts the timer and names the session; later owners
    /// only bump the count.
    ///
    /// # Errors
    ///
    /// [`SyncError::NoRuntime`] when called outside a tokio runtime.
    pub fn start(&self, label: &str) -> Result<(), SyncError> {
        let runtime = Handle::try_current().map_err(|_| SyncError::NoRuntime)?;
        let mut control = self.inner.control();
        control.owners += 1;

        if control.timer.is_some() {
            log::trace!("Sync already running, owners now {}", control.owners);
            return Ok(());
        }

        control.generation += 1;
        let generation = control.generation;
        self.inner.state_tx.send_replace(SessionState {
            is_active: true,
            label: label.to_string(),
            start_time: Some(Utc::now()),
            ..SessionState::default()
        });

        let token = CancellationToken::new();
        let guard = TaskGuard::new(&self.inner.running);
        let handle = runtime.spawn(run_ticks(
            Arc::downgrade(&self.inner),
            self.inner.config,
            generation,
            token.clone(),
            guard,
        ));
        control.timer = Some(Timer { token, handle });

        log::info!("Session sync `{label}' started (generation {generation})");
        Ok(())
    }

    /// Drop one owner; the last one stops the timer and resets state.
    ///
    /// # Errors
    ///
    /// [`SyncError::OwnerUnderflow`] when there is no owner left to drop.
    pub fn stop(&self) -> Result<(), SyncError> {
        let mut control = self.inner.control();
        if control.owners == 0 {
            log::error!("Session sync stop() without a matching start()");
            return Err(SyncError::OwnerUnderflow);
        }

        control.owners -= 1;
        if control.owners > 0 {
            log::trace!("Sync kept alive by {} owners", control.owners);
            return Ok(());
        }

        control.generation += 1;
        if let Some(timer) = control.timer.take() {
            timer.token.cancel();
            timer.handle.abort();
        }
        self.inner.state_tx.send_replace(SessionState::default());

        log::info!("Session sync stopped (generation {})", control.generation);
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.inner.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state_tx.subscribe()
    }

    pub fn owner_count(&self) -> usize {
        self.inner.control().owners
    }

    /// Whether a timer currently exists.
    pub fn is_running(&self) -> bool {
        self.inner.control().timer.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.inner.control().generation
    }

    /// Tick tasks that have not finished tearing down yet.
    pub fn running_tasks(&self) -> usize {
        self.inner.running.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    fn apply(&self, generation: u64, update: TickUpdate) -> bool {
        self.inner.apply(generation, update)
    }
}

async fn run_ticks(
    inner: Weak<Inner>,
    config: SyncConfig,
    generation: u64,
    token: CancellationToken,
    _guard: TaskGuard,
) {
    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(store) = inner.upgrade() else {
            break;
        };

        let outcome = tokio::select! {
            biased;
            () = token.cancelled() => break,
            outcome = poll(&store.registry, config.tick_timeout) => outcome,
        };

        match outcome {
            Ok(update) => {
                store.apply(generation, update);
            }
            Err(e) if e.is_transient() => log::debug!("Tick skipped, state unchanged: {e}"),
            Err(e) => log::warn!("Tick failed, state unchanged: {e}"),
        }
    }

    log::trace!("Tick task for generation {generation} finished");
}

async fn poll(
    registry: &ServiceRegistry,
    timeout: Duration,
) -> Result<TickUpdate, ServiceError> {
    let Some(service) = registry.active() else {
        return Ok(TickUpdate::default());
    };

    tokio::time::timeout(timeout, poll_service(service.as_ref()))
        .await
        .map_err(|_| ServiceError::timeout(service.id(), timeout))?
}

async fn poll_service(service: &dyn MediaService) -> Result<TickUpdate, ServiceError> {
    let connected = service.is_connected().await;
    let now_playing = if connected {
        service.playback_state().await?
    } else {
        None
    };
    log::trace!("Polled `{}': connected={connected}", service.id());

    Ok(TickUpdate {
        service_id: Some(service.id().to_string()),
        connected,
        now_playing,
    })
}
