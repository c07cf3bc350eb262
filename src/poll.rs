//! Telemetry polling.
//!
//! Three independent loops (stats, error codes, debug message), one thread
//! each. A loop is strictly sequential: request, decode, publish, wait. So
//! each stream has at most one request in flight against the controller.
//!
//! Each stream owns one field of the [`TelemetrySnapshot`]. A failed tick
//! records its error and leaves the last good value in place.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::addr::{Endpoint, Resource};
use crate::config::PollConfig;
use crate::conn::{ConnError, Transport};
use crate::frame::HttpRequest;
use crate::protocol::telemetry::{self, ErrorCodes, Stats};

/// One polled telemetry resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Stats,
    ErrorCodes,
    DebugMessage,
}

impl Stream {
    pub const ALL: [Stream; 3] = [Self::Stats, Self::ErrorCodes, Self::DebugMessage];

    pub fn resource(self) -> Resource {
        match self {
            Self::Stats => Resource::Stats,
            Self::ErrorCodes => Resource::ErrorCodes,
            Self::DebugMessage => Resource::DebugMsg,
        }
    }

    pub fn interval(self, config: &PollConfig) -> Duration {
        match self {
            Self::Stats => config.stats_interval,
            Self::ErrorCodes => config.error_codes_interval,
            Self::DebugMessage => config.debug_interval,
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.resource().path())
    }
}

/// Where a stream is in its poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamPhase {
    #[default]
    Idle,
    /// Request in flight.
    Polling,
    /// Last tick decoded cleanly.
    Success,
    /// Last tick failed; `last_error` says why.
    Failure,
    Stopped,
}

/// Latest state of one stream.
#[derive(Debug, Clone)]
pub struct Reading<T> {
    /// Last successfully decoded value.
    pub value: Option<T>,
    /// Error from the most recent failed tick, cleared on success.
    pub last_error: Option<String>,
    pub phase: StreamPhase,
    /// Completed ticks, successful or not.
    pub ticks: u64,
    pub failures: u64,
    /// When `value` was last replaced.
    pub updated_at: Option<Instant>,
}

impl<T> Default for Reading<T> {
    fn default() -> Self {
        Self {
            value: None,
            last_error: None,
            phase: StreamPhase::Idle,
            ticks: 0,
            failures: 0,
            updated_at: None,
        }
    }
}

impl<T> Reading<T> {
    fn record(&mut self, outcome: Result<T, String>) {
        self.ticks += 1;
        match outcome {
            Ok(value) => {
                self.value = Some(value);
                self.last_error = None;
                self.phase = StreamPhase::Success;
                self.updated_at = Some(Instant::now());
            }
            Err(e) => {
                self.last_error = Some(e);
                self.failures += 1;
                self.phase = StreamPhase::Failure;
            }
        }
    }
}

/// Latest known telemetry. Fields refresh independently; there is no
/// cross-field atomicity.
#[derive(Debug, Clone, Default)]
pub struct TelemetrySnapshot {
    pub stats: Reading<Stats>,
    pub error_codes: Reading<ErrorCodes>,
    pub debug_message: Reading<String>,
}

/// Called after every completed tick with the stream that ticked.
pub type UpdateCallback = dyn Fn(Stream, &TelemetrySnapshot) + Send + Sync;

struct Shared {
    stats: Mutex<Reading<Stats>>,
    error_codes: Mutex<Reading<ErrorCodes>>,
    debug_message: Mutex<Reading<String>>,
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl Shared {
    fn new() -> Self {
        Self {
            stats: Mutex::new(Reading::default()),
            error_codes: Mutex::new(Reading::default()),
            debug_message: Mutex::new(Reading::default()),
            stopped: Mutex::new(false),
            wake: Condvar::new(),
        }
    }

    fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            stats: lock(&self.stats).clone(),
            error_codes: lock(&self.error_codes).clone(),
            debug_message: lock(&self.debug_message).clone(),
        }
    }

    fn set_phase(&self, stream: Stream, phase: StreamPhase) {
        match stream {
            Stream::Stats => lock(&self.stats).phase = phase,
            Stream::ErrorCodes => lock(&self.error_codes).phase = phase,
            Stream::DebugMessage => lock(&self.debug_message).phase = phase,
        }
    }

    fn is_stopped(&self) -> bool {
        *lock(&self.stopped)
    }

    fn set_stopped(&self, stopped: bool) {
        *lock(&self.stopped) = stopped;
        self.wake.notify_all();
    }

    /// Sleep up to `timeout`, waking early on stop. Returns true if stopped.
    fn wait_for_stop(&self, timeout: Duration) -> bool {
        let guard = lock(&self.stopped);
        let (guard, _) = self
            .wake
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs the three telemetry loops and holds their latest results.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use puttpilot::addr::Endpoint;
/// use puttpilot::config::PollConfig;
/// use puttpilot::conn::HttpTransport;
/// use puttpilot::poll::PollingCoordinator;
///
/// let mut poller = PollingCoordinator::new(
///     Arc::new(HttpTransport::default()),
///     Endpoint::default(),
///     PollConfig::default(),
/// );
/// poller.start()?;
/// std::thread::sleep(std::time::Duration::from_secs(3));
/// println!("{:?}", poller.snapshot().stats.value);
/// poller.stop();
/// # Ok::<(), puttpilot::ConnError>(())
/// ```
pub struct PollingCoordinator<T: Transport> {
    transport: Arc<T>,
    endpoint: Endpoint,
    config: PollConfig,
    shared: Arc<Shared>,
    on_update: Option<Arc<UpdateCallback>>,
    workers: Vec<JoinHandle<()>>,
}

impl<T: Transport> PollingCoordinator<T> {
    pub fn new(transport: Arc<T>, endpoint: Endpoint, config: PollConfig) -> Self {
        Self {
            transport,
            endpoint,
            config,
            shared: Arc::new(Shared::new()),
            on_update: None,
            workers: Vec::new(),
        }
    }

    /// Register a callback invoked after every completed tick. Takes effect
    /// on the next [`start()`](Self::start).
    pub fn on_update(&mut self, f: impl Fn(Stream, &TelemetrySnapshot) + Send + Sync + 'static) {
        self.on_update = Some(Arc::new(f));
    }

    /// Spawn the three poll loops. No-op if already running.
    pub fn start(&mut self) -> Result<(), ConnError> {
        if self.is_running() {
            return Ok(());
        }
        self.shared.set_stopped(false);
        for stream in Stream::ALL {
            let worker = Worker {
                stream,
                interval: stream.interval(&self.config),
                validate_stats: self.config.validate_stats,
                transport: Arc::clone(&self.transport),
                endpoint: self.endpoint.clone(),
                shared: Arc::clone(&self.shared),
                on_update: self.on_update.clone(),
            };
            let spawned = thread::Builder::new()
                .name(format!("poll-{stream}"))
                .spawn(move || worker.run());
            match spawned {
                Ok(handle) => self.workers.push(handle),
                Err(e) => {
                    self.stop();
                    return Err(ConnError::Io(e));
                }
            }
        }
        info!(address = %self.endpoint.address(), "telemetry polling started");
        Ok(())
    }

    /// Cancel all loops and wait for them to exit. Once this returns, no
    /// further requests are issued.
    pub fn stop(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        self.shared.set_stopped(true);
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("telemetry poll thread panicked");
            }
        }
        info!("telemetry polling stopped");
    }

    pub fn is_running(&self) -> bool {
        !self.workers.is_empty()
    }

    /// Copy of the latest telemetry.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.shared.snapshot()
    }
}

impl<T: Transport> Drop for PollingCoordinator<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State moved into one poll thread.
struct Worker<T: Transport> {
    stream: Stream,
    interval: Duration,
    validate_stats: bool,
    transport: Arc<T>,
    endpoint: Endpoint,
    shared: Arc<Shared>,
    on_update: Option<Arc<UpdateCallback>>,
}

impl<T: Transport> Worker<T> {
    fn run(self) {
        let mut was_failing = false;
        loop {
            if self.shared.is_stopped() {
                break;
            }
            self.shared.set_phase(self.stream, StreamPhase::Polling);

            let error = self.tick();
            match error {
                Some(e) if !was_failing => {
                    warn!(stream = %self.stream, "telemetry poll failed: {e}");
                    was_failing = true;
                }
                Some(e) => debug!(stream = %self.stream, "telemetry poll still failing: {e}"),
                None if was_failing => {
                    info!(stream = %self.stream, "telemetry poll recovered");
                    was_failing = false;
                }
                None => {}
            }

            if let Some(cb) = &self.on_update {
                cb(self.stream, &self.shared.snapshot());
            }
            if self.shared.wait_for_stop(self.interval) {
                break;
            }
        }
        self.shared.set_phase(self.stream, StreamPhase::Stopped);
    }

    /// Run one request/decode/publish cycle. Returns the error, if any.
    fn tick(&self) -> Option<String> {
        match self.stream {
            Stream::Stats => {
                let outcome = self.fetch().and_then(|body| {
                    let stats = telemetry::decode_stats(&body)?;
                    if self.validate_stats {
                        stats.validate()?;
                    }
                    Ok(stats)
                });
                publish(&self.shared.stats, outcome)
            }
            Stream::ErrorCodes => {
                let outcome = self
                    .fetch()
                    .and_then(|body| Ok(telemetry::decode_error_codes(&body)?));
                publish(&self.shared.error_codes, outcome)
            }
            Stream::DebugMessage => {
                let outcome = self
                    .fetch()
                    .and_then(|body| Ok(telemetry::decode_debug_message(&body)?));
                publish(&self.shared.debug_message, outcome)
            }
        }
    }

    fn fetch(&self) -> Result<Vec<u8>, ConnError> {
        let resource = self.stream.resource();
        let resp = self.transport.execute(&HttpRequest::get(self.endpoint.url(resource)))?;
        if !resp.is_success() {
            return Err(ConnError::Status { resource, code: resp.status });
        }
        Ok(resp.body)
    }
}

fn publish<V>(slot: &Mutex<Reading<V>>, outcome: Result<V, ConnError>) -> Option<String> {
    let outcome = outcome.map_err(|e| e.to_string());
    let error = outcome.as_ref().err().cloned();
    lock(slot).record(outcome);
    error
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
