//! Controller session: address management, connectivity probe, and one-shot
//! commands.
//!
//! A [`Session`] is built explicitly and passed to whoever needs it. Clones
//! share the same transport, address and in-flight bookkeeping. Two layers:
//!
//! 1. **Core helper**: [`Session::send`] encodes a [`Command`], POSTs it and
//!    maps non-200 replies to errors. At most one request per
//!    [`CommandKind`] is outstanding at a time. Course and settings writes
//!    wait for a pending default-state push, so a caller's write is never
//!    overwritten by the defaults.
//! 2. **Operations**: probe, default-state push, and typed wrappers for each
//!    command the app issues.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::addr::{Endpoint, Resource};
use crate::config::ClientConfig;
use crate::conn::{ConnError, HttpTransport, Transport};
use crate::frame::{HttpRequest, HttpResponse};
use crate::mode::{BallDispensingMode, CourseMode};
use crate::poll::PollingCoordinator;
use crate::protocol::{Command, CommandKind, CourseState, PayloadOptions};
use crate::shape::{ActuatorGrid, CourseShape, Preset, ShapeGenerator};

// ---------------------------------------------------------------------------
// In-flight guard
// ---------------------------------------------------------------------------

/// Clears its command kind's in-flight flag on drop.
struct InFlight<'a> {
    flag: &'a AtomicBool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Default-state gate
// ---------------------------------------------------------------------------

/// Counts default-state pushes still running.
#[derive(Default)]
struct DefaultsGate {
    pending: Mutex<usize>,
    settled: Condvar,
}

impl DefaultsGate {
    fn hold(&self) {
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }

    fn release(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        *pending = pending.saturating_sub(1);
        self.settled.notify_all();
    }

    /// Block until no push is pending. Each push is bounded by the
    /// transport timeout, so this wait is too.
    fn wait(&self) {
        let pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let _settled = self
            .settled
            .wait_while(pending, |n| *n > 0)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

/// Releases one hold on drop, including when the push thread panics.
struct Held<'a>(&'a DefaultsGate);

impl Drop for Held<'_> {
    fn drop(&mut self) {
        self.0.release();
    }
}

/// Writes the default-state push makes, and so must order behind it.
fn overlaps_defaults(kind: CommandKind) -> bool {
    matches!(kind, CommandKind::CourseState | CommandKind::Settings)
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

struct Inner<T: Transport> {
    transport: Arc<T>,
    endpoint: Endpoint,
    config: ClientConfig,
    in_flight: [AtomicBool; CommandKind::ALL.len()],
    defaults: DefaultsGate,
}

/// Handle to one controller.
///
/// # Example
///
/// ```no_run
/// use puttpilot::{ClientConfig, Session};
/// use puttpilot::shape::{CourseShape, SlopeEffect};
///
/// let session = Session::connect_http(ClientConfig::default())?;
/// session.probe()?;
/// let shape = CourseShape {
///     left_lean: SlopeEffect::new(50.0, 25.0),
///     ..Default::default()
/// };
/// session.send_shape(&shape)?;
/// # Ok::<(), puttpilot::ConnError>(())
/// ```
pub struct Session<T: Transport> {
    inner: Arc<Inner<T>>,
}

impl<T: Transport> Clone for Session<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl Session<HttpTransport> {
    /// Session over the built-in blocking HTTP transport, using the config's
    /// request timeout.
    pub fn connect_http(config: ClientConfig) -> Result<Self, ConnError> {
        let transport = HttpTransport::new(config.request_timeout);
        Self::new(config, transport)
    }
}

impl<T: Transport> Session<T> {
    pub fn new(config: ClientConfig, transport: T) -> Result<Self, ConnError> {
        Self::with_shared_transport(config, Arc::new(transport))
    }

    pub fn with_shared_transport(config: ClientConfig, transport: Arc<T>) -> Result<Self, ConnError> {
        let endpoint = Endpoint::new(&config.address)?;
        Ok(Self {
            inner: Arc::new(Inner {
                transport,
                endpoint,
                config,
                in_flight: Default::default(),
                defaults: DefaultsGate::default(),
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.inner.endpoint
    }

    pub fn address(&self) -> String {
        self.inner.endpoint.address()
    }

    /// Point the session (and any poller built from it) at a new controller.
    pub fn set_address(&self, address: &str) -> Result<(), ConnError> {
        self.inner.endpoint.set_address(address)?;
        info!(address = %self.address(), "controller address updated");
        Ok(())
    }

    pub fn url(&self, resource: Resource) -> String {
        self.inner.endpoint.url(resource)
    }

    /// Shape generator for the canonical grid with the configured orientation.
    pub fn generator(&self) -> ShapeGenerator {
        ShapeGenerator {
            orientation: self.inner.config.orientation,
            ..ShapeGenerator::default()
        }
    }

    /// Telemetry poller sharing this session's transport and address.
    pub fn poller(&self) -> PollingCoordinator<T> {
        PollingCoordinator::new(
            Arc::clone(&self.inner.transport),
            self.inner.endpoint.clone(),
            self.inner.config.poll,
        )
    }

    // -----------------------------------------------------------------------
    // Core helpers
    // -----------------------------------------------------------------------

    fn get(&self, resource: Resource) -> Result<HttpResponse, ConnError> {
        let resp = self.inner.transport.execute(&HttpRequest::get(self.url(resource)))?;
        if !resp.is_success() {
            return Err(ConnError::Status { resource, code: resp.status });
        }
        Ok(resp)
    }

    fn acquire(&self, kind: CommandKind) -> Result<InFlight<'_>, ConnError> {
        let flag = &self.inner.in_flight[kind.index()];
        if flag.swap(true, Ordering::AcqRel) {
            return Err(ConnError::Busy { command: kind });
        }
        Ok(InFlight { flag })
    }

    /// Encode and POST a command.
    ///
    /// Encoding happens before anything touches the network, so an invalid
    /// command never reaches the controller. Fails with
    /// [`ConnError::Busy`] if a command of the same kind is still
    /// outstanding. Course and settings writes first wait for any
    /// default-state push started by [`probe`](Self::probe).
    pub fn send(&self, cmd: &Command) -> Result<(), ConnError> {
        if overlaps_defaults(cmd.kind()) {
            self.inner.defaults.wait();
        }
        self.post(cmd)
    }

    /// [`send`](Self::send) without waiting on the default-state gate.
    fn post(&self, cmd: &Command) -> Result<(), ConnError> {
        let body = cmd.encode()?;
        let _guard = self.acquire(cmd.kind())?;
        let resource = cmd.resource();
        debug!("{}", cmd.debug_hex());

        let resp = self
            .inner
            .transport
            .execute(&HttpRequest::post(self.url(resource), body))?;
        if !resp.is_success() {
            return Err(ConnError::Status { resource, code: resp.status });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Connection
    // -----------------------------------------------------------------------

    /// GET `ping`. On success, pushes the default state in the background;
    /// that push never affects this result. Course and settings writes
    /// issued meanwhile wait for it and land after the defaults.
    pub fn probe(&self) -> Result<DefaultPush, ConnError> {
        self.get(Resource::Ping)?;
        info!(address = %self.address(), "controller reachable");

        // Hold the gate before spawning so a send right after probe() returns
        // already sees the push as pending.
        self.inner.defaults.hold();
        let session = self.clone();
        let spawned = thread::Builder::new()
            .name("default-state".into())
            .spawn(move || {
                let _held = Held(&session.inner.defaults);
                if let Err(e) = session.push_defaults() {
                    warn!("default state push incomplete: {e}");
                }
            });
        match spawned {
            Ok(handle) => Ok(DefaultPush { handle: Some(handle) }),
            Err(e) => {
                self.inner.defaults.release();
                warn!("could not start default state push: {e}");
                Ok(DefaultPush { handle: None })
            }
        }
    }

    /// Send manual dispensing and an all-zero static course. Both are
    /// attempted; the first failure is returned.
    pub fn push_default_state(&self) -> Result<(), ConnError> {
        self.inner.defaults.wait();
        self.push_defaults()
    }

    fn push_defaults(&self) -> Result<(), ConnError> {
        let settings = self.post(&Command::Settings(BallDispensingMode::Manual));
        match &settings {
            Ok(()) => info!("default dispensing mode sent"),
            Err(e) => warn!("default dispensing mode failed: {e}"),
        }
        let course = self.post(&Command::CourseState(CourseState {
            mode: CourseMode::Static,
            grid: ActuatorGrid::flat(),
            options: self.inner.config.payload,
        }));
        match &course {
            Ok(()) => info!("default course state sent"),
            Err(e) => warn!("default course state failed: {e}"),
        }
        settings.and(course)
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Send a grid in the given mode with the configured payload options.
    pub fn send_course_state(&self, mode: CourseMode, grid: &ActuatorGrid) -> Result<(), ConnError> {
        self.send_course_state_with(mode, grid, self.inner.config.payload)
    }

    /// Send a grid at full amplitude (no easing).
    pub fn send_course_state_max(&self, mode: CourseMode, grid: &ActuatorGrid) -> Result<(), ConnError> {
        let options = PayloadOptions { easing: false, ..self.inner.config.payload };
        self.send_course_state_with(mode, grid, options)
    }

    fn send_course_state_with(
        &self,
        mode: CourseMode,
        grid: &ActuatorGrid,
        options: PayloadOptions,
    ) -> Result<(), ConnError> {
        let state = CourseState { mode, grid: grid.clone(), options };
        self.send(&Command::CourseState(state))
    }

    /// Generate a grid from slope effects and send it in static mode.
    /// Returns the grid that was sent.
    pub fn send_shape(&self, shape: &CourseShape) -> Result<ActuatorGrid, ConnError> {
        let grid = self.generator().generate_shape(shape);
        self.send_course_state(CourseMode::Static, &grid)?;
        Ok(grid)
    }

    pub fn send_preset(&self, preset: Preset, mode: CourseMode) -> Result<(), ConnError> {
        self.send_course_state(mode, &preset.grid())
    }

    /// Run the ball-return sequence, holding `grid` as the course shape.
    pub fn return_balls(&self, grid: &ActuatorGrid) -> Result<(), ConnError> {
        self.send_course_state(CourseMode::BallReturn, grid)
    }

    pub fn reset_stats(&self) -> Result<(), ConnError> {
        self.send(&Command::ResetStats)
    }

    /// Dispense `count` balls (0..=10; anything else is rejected unsent).
    pub fn dispense_balls(&self, count: u32) -> Result<(), ConnError> {
        self.send(&Command::DispenseBall(count))
    }

    pub fn send_settings(&self, mode: BallDispensingMode) -> Result<(), ConnError> {
        self.send(&Command::Settings(mode))
    }

    /// Legacy ball-return endpoint, for firmware that still serves it.
    pub fn clear_sequence(&self) -> Result<(), ConnError> {
        self.send(&Command::ClearSequence)
    }
}

/// The background default-state push started by a successful probe.
///
/// Dropping it detaches the push.
#[derive(Debug)]
pub struct DefaultPush {
    handle: Option<JoinHandle<()>>,
}

impl DefaultPush {
    /// Block until the push has finished (its errors are only logged).
    pub fn wait(mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("default state push panicked");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::{Condvar, Mutex};
    use std::time::{Duration, Instant};

    use super::*;
    use crate::error::WireError;
    use crate::mock::MockTransport;
    use crate::protocol::course::PAYLOAD_LEN;
    use crate::shape::SlopeEffect;

    fn ok() -> Result<HttpResponse, ConnError> {
        Ok(HttpResponse::new(200, "OK"))
    }

    fn session_with(mock: MockTransport) -> (Session<MockTransport>, Arc<MockTransport>) {
        let mock = Arc::new(mock);
        let session = Session::with_shared_transport(ClientConfig::default(), Arc::clone(&mock)).unwrap();
        (session, mock)
    }

    fn controller() -> MockTransport {
        let mock = MockTransport::new();
        for path in [
            "/ping",
            "/course_state",
            "/settings",
            "/reset_stats",
            "/dispense_ball",
            "/clear_sequence",
        ] {
            mock.route(path, |_| ok());
        }
        mock
    }

    #[test]
    fn probe_pushes_default_state() {
        let (session, mock) = session_with(controller());
        session.probe().unwrap().wait();

        let settings = mock.requests_to("/settings");
        assert_eq!(settings.len(), 1);
        assert_eq!(settings[0].body, vec![0x00]);

        let course = mock.requests_to("/course_state");
        assert_eq!(course.len(), 1);
        assert_eq!(course[0].body.len(), PAYLOAD_LEN);
        assert_eq!(course[0].body[0], CourseMode::Static.as_byte());
        assert!(course[0].body[1..].iter().all(|&b| b == 90));
        assert_eq!(course[0].url, "http://192.168.4.1/course_state");
    }

    #[test]
    fn probe_failure_reports_and_pushes_nothing() {
        let mock = controller();
        mock.route("/ping", |_| Ok(HttpResponse::new(503, "")));
        let (session, mock) = session_with(mock);
        let err = session.probe().unwrap_err();
        assert!(matches!(err, ConnError::Status { resource: Resource::Ping, code: 503 }));
        assert!(err.to_string().contains("503"));
        assert!(mock.requests_to("/settings").is_empty());
        assert!(mock.requests_to("/course_state").is_empty());
    }

    #[test]
    fn probe_transport_error() {
        let mock = controller();
        mock.route("/ping", |_| {
            Err(ConnError::Timeout { timeout: Duration::from_secs(2) })
        });
        let (session, _) = session_with(mock);
        assert!(matches!(session.probe(), Err(ConnError::Timeout { .. })));
    }

    #[test]
    fn default_push_failure_does_not_fail_probe() {
        let mock = controller();
        mock.route("/settings", |_| Ok(HttpResponse::new(500, "")));
        let (session, mock) = session_with(mock);
        session.probe().unwrap().wait();
        // Course state is still attempted after the settings failure.
        assert_eq!(mock.requests_to("/course_state").len(), 1);
        assert!(matches!(
            session.push_default_state(),
            Err(ConnError::Status { resource: Resource::Settings, code: 500 })
        ));
    }

    #[test]
    fn send_after_probe_lands_after_defaults() {
        let mock = controller();
        mock.route("/settings", |_| {
            thread::sleep(Duration::from_millis(20));
            ok()
        });
        let (session, mock) = session_with(mock);

        let _push = session.probe().unwrap();
        let shape = CourseShape {
            left_lean: SlopeEffect::new(50.0, 25.0),
            ..Default::default()
        };
        let grid = session.send_shape(&shape).unwrap();

        let course = mock.requests_to("/course_state");
        assert_eq!(course.len(), 2);
        assert!(course[0].body[1..].iter().all(|&b| b == 90));
        let expected =
            crate::protocol::build_course_state_payload(CourseMode::Static, &grid, PayloadOptions::default())
                .unwrap();
        assert_eq!(course[1].body, expected);

        session.send_settings(BallDispensingMode::Automatic).unwrap();
        let settings = mock.requests_to("/settings");
        assert_eq!(settings.len(), 2);
        assert_eq!(settings[1].body, vec![0x01]);
    }

    #[test]
    fn failed_default_push_releases_waiting_sends() {
        let mock = controller();
        mock.route("/settings", |_| Ok(HttpResponse::new(500, "")));
        mock.route("/course_state", |_| {
            Err(ConnError::Timeout { timeout: Duration::from_millis(10) })
        });
        let (session, mock) = session_with(mock);

        let _push = session.probe().unwrap();
        assert!(session.send_course_state(CourseMode::Wave, &ActuatorGrid::flat()).is_err());
        assert_eq!(mock.requests_to("/course_state").len(), 2);
        // Writes the defaults don't touch are not held back.
        session.reset_stats().unwrap();
    }

    #[test]
    fn non_200_post_is_failure() {
        let mock = controller();
        mock.route("/reset_stats", |_| Ok(HttpResponse::new(400, "bad")));
        let (session, _) = session_with(mock);
        assert!(matches!(
            session.reset_stats(),
            Err(ConnError::Status { resource: Resource::ResetStats, code: 400 })
        ));
    }

    #[test]
    fn invalid_dispense_never_sent() {
        let (session, mock) = session_with(controller());
        assert!(matches!(
            session.dispense_balls(11),
            Err(ConnError::Wire(WireError::DispenseOutOfRange { count: 11 }))
        ));
        assert_eq!(mock.request_count(), 0);

        session.dispense_balls(10).unwrap();
        assert_eq!(mock.requests_to("/dispense_ball")[0].body, vec![0x0A]);
    }

    #[test]
    fn wrong_grid_never_sent() {
        let (session, mock) = session_with(controller());
        let legacy = ActuatorGrid::zeroed(3, 5);
        assert!(matches!(
            session.send_course_state(CourseMode::Static, &legacy),
            Err(ConnError::Wire(WireError::GridDimensions { .. }))
        ));
        assert_eq!(mock.request_count(), 0);
    }

    #[test]
    fn commands_hit_their_resources() {
        let (session, mock) = session_with(controller());
        session.send_settings(BallDispensingMode::Automatic).unwrap();
        session.reset_stats().unwrap();
        session.clear_sequence().unwrap();
        session.return_balls(&ActuatorGrid::flat()).unwrap();

        assert_eq!(mock.requests_to("/settings")[0].body, vec![0x01]);
        assert!(mock.requests_to("/reset_stats")[0].body.is_empty());
        assert!(mock.requests_to("/clear_sequence")[0].body.is_empty());
        assert_eq!(mock.requests_to("/course_state")[0].body[0], 0x01);
        assert!(mock.requests().iter().all(|r| r.method == crate::frame::Method::Post));
    }

    #[test]
    fn send_shape_returns_sent_grid() {
        let (session, mock) = session_with(controller());
        let shape = CourseShape {
            left_lean: SlopeEffect::new(50.0, 25.0),
            ..Default::default()
        };
        let grid = session.send_shape(&shape).unwrap();
        assert_eq!(grid.get(0, 4), Some(45.0));

        let expected =
            crate::protocol::build_course_state_payload(CourseMode::Static, &grid, PayloadOptions::default())
                .unwrap();
        assert_eq!(mock.requests_to("/course_state")[0].body, expected);
    }

    #[test]
    fn max_send_skips_easing() {
        let (session, mock) = session_with(controller());
        session.send_preset(Preset::Uphill, CourseMode::Tsunami).unwrap();
        session
            .send_course_state_max(CourseMode::Tsunami, &Preset::Uphill.grid())
            .unwrap();
        let sent = mock.requests_to("/course_state");
        // First transmitted row is grid row 8 (90 deg): eased to 30, raw 90.
        assert_eq!(sent[0].body[1], 90 - 30);
        assert_eq!(sent[1].body[1], 0);
        assert_eq!(sent[1].body[0], CourseMode::Tsunami.as_byte());
    }

    #[test]
    fn same_kind_is_serialized_other_kinds_are_not() {
        let gate = Arc::new((Mutex::new(false), Condvar::new()));
        let mock = controller();
        let g = Arc::clone(&gate);
        mock.route("/course_state", move |_| {
            let (open, cv) = &*g;
            let mut open = open.lock().unwrap();
            while !*open {
                open = cv.wait(open).unwrap();
            }
            ok()
        });
        let (session, mock) = session_with(mock);

        let background = session.clone();
        let first = thread::spawn(move || background.send_course_state(CourseMode::Wave, &ActuatorGrid::flat()));

        let deadline = Instant::now() + Duration::from_secs(5);
        while mock.requests_to("/course_state").is_empty() {
            assert!(Instant::now() < deadline, "first send never arrived");
            thread::sleep(Duration::from_millis(2));
        }

        assert!(matches!(
            session.send_course_state(CourseMode::Static, &ActuatorGrid::flat()),
            Err(ConnError::Busy { command: CommandKind::CourseState })
        ));
        session.send_settings(BallDispensingMode::Manual).unwrap();

        {
            let (open, cv) = &*gate;
            *open.lock().unwrap() = true;
            cv.notify_all();
        }
        first.join().unwrap().unwrap();
        session.send_course_state(CourseMode::Static, &ActuatorGrid::flat()).unwrap();
        assert_eq!(mock.requests_to("/course_state").len(), 2);
    }

    #[test]
    fn address_changes_apply_to_next_request() {
        let (session, mock) = session_with(controller());
        assert!(matches!(
            session.set_address(""),
            Err(ConnError::InvalidAddress { .. })
        ));
        assert_eq!(session.address(), "192.168.4.1");

        session.set_address("10.0.0.31").unwrap();
        session.reset_stats().unwrap();
        assert_eq!(mock.requests()[0].url, "http://10.0.0.31/reset_stats");
        assert_eq!(session.poller().snapshot().stats.ticks, 0);
    }

    #[test]
    fn bad_config_address_rejected() {
        let config = ClientConfig { address: String::new(), ..ClientConfig::default() };
        assert!(Session::new(config, MockTransport::new()).is_err());
    }
}
