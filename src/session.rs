use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, oneshot, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::connectivity::ConnectivityGuard;
use crate::gps_processor::{CoordinateSample, GpsProcessor, ProcessResult};
use crate::location_source::{LocationError, LocationOptions, LocationSource};
use crate::permission::{PermissionGate, PermissionState};
use crate::route_log::{PersistenceError, Route, RouteLogStore};
use crate::throttle::Throttle;

/* The sampling session: `Idle` -> start -> `Tracking` -> stop -> `Idle`.

While tracking, one scheduler task fires a tick every `sample_interval`.
Manual refreshes go through the same tick path. Ticks are serialized by
`tick_state` (throttle + processor) and share one throttle, so a refresh and a
scheduled tick that land close together produce a single read.

Every start/stop bumps `epoch`, which tells a scheduler task whether it still
owns the session. Only stop bumps `stops`. A tick remembers the `stops` value
it began with and drops its result if a stop happened while the read was
suspended. Stopping therefore never aborts a read half way, it just makes the
result stale. Starting does not: a refresh that was in flight when tracking
began still records its fix.
*/

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub sample_interval_ms: u64,
    pub throttle_interval_ms: u64,
    pub location_options: LocationOptions,
    pub stop_clears_history: bool,
    /// Span of the map viewport, in degrees, requested when recentering.
    pub recenter_delta: f64,
}

impl SessionConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn throttle_interval(&self) -> Duration {
        Duration::from_millis(self.throttle_interval_ms)
    }

    /// Replaces a zero sample interval with the default one.
    pub fn sanitized(mut self) -> Self {
        if self.sample_interval_ms == 0 {
            let fallback = SessionConfig::default().sample_interval_ms;
            warn!(
                "[session] sample interval must be positive, using {}ms",
                fallback
            );
            self.sample_interval_ms = fallback;
        }
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            sample_interval_ms: 5000,
            throttle_interval_ms: 1000,
            location_options: LocationOptions::default(),
            stop_clears_history: false,
            recenter_delta: 0.005,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
pub enum SessionState {
    Idle,
    Tracking,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapRegion {
    pub latitude: f64,
    pub longitude: f64,
    pub latitude_delta: f64,
    pub longitude_delta: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged(SessionState),
    SampleRecorded(CoordinateSample),
    Recenter(MapRegion),
    Error(String),
    HistoryCleared,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub state: SessionState,
    pub permission: PermissionState,
    pub live_route_len: usize,
    pub last_fix: Option<CoordinateSample>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("permission to access location was denied")]
    Permission,
    #[error("no network connection, please check your internet connection")]
    Connectivity,
    #[error("failed to get location: {0}")]
    LocationRead(#[from] LocationError),
    #[error("failed to save location: {0}")]
    Persistence(#[from] PersistenceError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Recorded,
    // added to the live route but the route log rejected it
    Unsaved,
    Throttled,
    Failed,
    Discarded,
}

pub struct Collaborators {
    pub permission: Arc<PermissionGate>,
    pub location_source: Arc<dyn LocationSource>,
    pub connectivity: Arc<dyn ConnectivityGuard>,
    pub route_log: Arc<dyn RouteLogStore>,
}

struct TickState {
    throttle: Throttle,
    gps_processor: GpsProcessor,
}

struct Scheduler {
    cancel: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

struct Shared {
    state: SessionState,
    epoch: u64,
    stops: u64,
    live_route: Route,
    last_error: Option<String>,
    scheduler: Option<Scheduler>,
}

struct Inner {
    id: Uuid,
    config: SessionConfig,
    collaborators: Collaborators,
    tick_state: AsyncMutex<TickState>,
    shared: Mutex<Shared>,
    events: broadcast::Sender<SessionEvent>,
    status: watch::Sender<SessionStatus>,
}

impl Inner {
    fn epoch(&self) -> u64 {
        self.shared.lock().unwrap().epoch
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.epoch() == epoch
    }

    fn stops(&self) -> u64 {
        self.shared.lock().unwrap().stops
    }

    fn stopped_since(&self, stops: u64) -> bool {
        self.stops() != stops
    }

    fn emit(&self, event: SessionEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    fn publish_status(&self) {
        let shared = self.shared.lock().unwrap();
        self.status.send_replace(SessionStatus {
            state: shared.state,
            permission: self.collaborators.permission.state(),
            live_route_len: shared.live_route.len(),
            last_fix: shared.live_route.last().copied(),
            last_error: shared.last_error.clone(),
        });
    }

    fn report(&self, error: &SessionError) {
        let message = error.to_string();
        match error {
            SessionError::Permission | SessionError::Connectivity => {
                warn!("[session {}] {}", self.id, message)
            }
            SessionError::LocationRead(_) | SessionError::Persistence(_) => {
                error!("[session {}] {}", self.id, message)
            }
        }
        self.shared.lock().unwrap().last_error = Some(message.clone());
        self.emit(SessionEvent::Error(message));
        self.publish_status();
    }

    async fn check_permission(&self) -> Result<(), SessionError> {
        let permission = self.collaborators.permission.request_access().await;
        self.publish_status();
        if permission != PermissionState::Granted {
            let error = SessionError::Permission;
            self.report(&error);
            return Err(error);
        }
        Ok(())
    }

    async fn tick(&self, stops: u64) -> TickOutcome {
        let mut tick_state = self.tick_state.lock().await;
        if self.stopped_since(stops) {
            return TickOutcome::Discarded;
        }
        if !tick_state.throttle.try_acquire() {
            debug!("[session {}] throttled, dropping read", self.id);
            return TickOutcome::Throttled;
        }

        let options = &self.config.location_options;
        let sample = match self.collaborators.location_source.read_once(options).await {
            Ok(sample) => sample,
            Err(error) => {
                self.report(&SessionError::LocationRead(error));
                return TickOutcome::Failed;
            }
        };
        if self.stopped_since(stops) {
            info!(
                "[session {}] stopped during read, discarding {:?}",
                self.id, sample
            );
            return TickOutcome::Discarded;
        }

        match tick_state.gps_processor.preprocess(&sample) {
            ProcessResult::Append => (),
            ProcessResult::OutOfOrder => warn!(
                "[session {}] out of order sample accepted: {:?}, newest is {:?}",
                self.id,
                sample,
                tick_state.gps_processor.last_data()
            ),
            ProcessResult::Ignore => {
                self.report(&SessionError::LocationRead(LocationError::InvalidFix {
                    latitude: sample.latitude,
                    longitude: sample.longitude,
                }));
                return TickOutcome::Failed;
            }
        }

        let persisted = self.collaborators.route_log.append(sample).await;
        {
            let mut shared = self.shared.lock().unwrap();
            shared.live_route.push(sample);
        }
        self.emit(SessionEvent::SampleRecorded(sample));
        self.emit(SessionEvent::Recenter(MapRegion {
            latitude: sample.latitude,
            longitude: sample.longitude,
            latitude_delta: self.config.recenter_delta,
            longitude_delta: self.config.recenter_delta,
        }));
        match persisted {
            Ok(()) => {
                self.publish_status();
                TickOutcome::Recorded
            }
            Err(error) => {
                self.report(&SessionError::Persistence(error));
                TickOutcome::Unsaved
            }
        }
    }

    async fn run_schedule(
        self: Arc<Self>,
        epoch: u64,
        stops: u64,
        mut cancel: oneshot::Receiver<()>,
    ) {
        let period = self.config.sample_interval();
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            // Only the wait is cancellable, a tick that already started runs
            // to completion.
            tokio::select! {
                _ = &mut cancel => break,
                _ = interval.tick() => (),
            }
            if !self.is_current(epoch) {
                break;
            }
            self.tick(stops).await;
        }
        debug!("[session {}] scheduler for epoch {} finished", self.id, epoch);
    }
}

pub struct SamplingSession {
    inner: Arc<Inner>,
}

impl SamplingSession {
    pub fn new(config: SessionConfig, collaborators: Collaborators) -> Self {
        let config = config.sanitized();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (status, _) = watch::channel(SessionStatus {
            state: SessionState::Idle,
            permission: collaborators.permission.state(),
            live_route_len: 0,
            last_fix: None,
            last_error: None,
        });
        let id = Uuid::new_v4();
        info!("[session {}] created with {:?}", id, config);
        SamplingSession {
            inner: Arc::new(Inner {
                id,
                tick_state: AsyncMutex::new(TickState {
                    throttle: Throttle::new(config.throttle_interval()),
                    gps_processor: GpsProcessor::new(),
                }),
                config,
                collaborators,
                shared: Mutex::new(Shared {
                    state: SessionState::Idle,
                    epoch: 0,
                    stops: 0,
                    live_route: Vec::new(),
                    last_error: None,
                    scheduler: None,
                }),
                events,
                status,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn state(&self) -> SessionState {
        self.inner.shared.lock().unwrap().state
    }

    pub fn live_route(&self) -> Route {
        self.inner.shared.lock().unwrap().live_route.clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.inner.status.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Takes an immediate sample, then keeps sampling every
    /// `sample_interval` until `stop`. Starting a running session is a no-op.
    pub async fn start(&self) -> Result<(), SessionError> {
        if self.state() == SessionState::Tracking {
            debug!("[session {}] already tracking", self.inner.id);
            return Ok(());
        }
        self.inner.check_permission().await?;
        if !self.inner.collaborators.connectivity.is_connected().await {
            let error = SessionError::Connectivity;
            self.inner.report(&error);
            return Err(error);
        }

        let (epoch, stops) = {
            let mut shared = self.inner.shared.lock().unwrap();
            if shared.state == SessionState::Tracking {
                return Ok(());
            }
            shared.state = SessionState::Tracking;
            shared.epoch += 1;
            shared.live_route.clear();
            shared.last_error = None;
            (shared.epoch, shared.stops)
        };
        info!("[session {}] tracking started, epoch={}", self.inner.id, epoch);
        self.inner.emit(SessionEvent::StateChanged(SessionState::Tracking));
        self.inner.publish_status();

        self.inner.tick(stops).await;

        let (cancel, cancel_rx) = oneshot::channel();
        let handle = tokio::spawn(self.inner.clone().run_schedule(epoch, stops, cancel_rx));
        let mut shared = self.inner.shared.lock().unwrap();
        if shared.epoch == epoch {
            shared.scheduler = Some(Scheduler { cancel, handle });
        } else {
            // stopped while the first sample was in flight
            handle.abort();
        }
        Ok(())
    }

    /// Cancels the schedule. Stopping an idle session is a no-op. Only
    /// clears the history when `stop_clears_history` is set.
    pub async fn stop(&self) -> Result<(), SessionError> {
        let scheduler = {
            let mut shared = self.inner.shared.lock().unwrap();
            if shared.state == SessionState::Idle {
                return Ok(());
            }
            shared.state = SessionState::Idle;
            shared.epoch += 1;
            shared.stops += 1;
            shared.scheduler.take()
        };
        if let Some(scheduler) = scheduler {
            let _ = scheduler.cancel.send(());
        }
        info!("[session {}] tracking stopped", self.inner.id);
        self.inner.emit(SessionEvent::StateChanged(SessionState::Idle));
        self.inner.publish_status();

        if self.inner.config.stop_clears_history {
            self.clear_history().await?;
        }
        Ok(())
    }

    /// One sample outside the schedule, subject to the same throttle.
    pub async fn refresh_once(&self) -> Result<TickOutcome, SessionError> {
        self.inner.check_permission().await?;
        let stops = self.inner.stops();
        Ok(self.inner.tick(stops).await)
    }

    /// Empties the route log and the live route. Waits for an in-flight tick
    /// so its write cannot land after the clear.
    pub async fn clear_history(&self) -> Result<(), SessionError> {
        let mut tick_state = self.inner.tick_state.lock().await;
        if let Err(error) = self.inner.collaborators.route_log.clear().await {
            let error = SessionError::Persistence(error);
            self.inner.report(&error);
            return Err(error);
        }
        tick_state.gps_processor.reset();
        self.inner.shared.lock().unwrap().live_route.clear();
        drop(tick_state);

        info!("[session {}] history cleared", self.inner.id);
        self.inner.emit(SessionEvent::HistoryCleared);
        self.inner.publish_status();
        Ok(())
    }
}

impl Drop for SamplingSession {
    fn drop(&mut self) {
        let scheduler = match self.inner.shared.lock() {
            Ok(mut shared) => shared.scheduler.take(),
            Err(_) => None,
        };
        if let Some(scheduler) = scheduler {
            scheduler.handle.abort();
        }
    }
}
