//! Capture/scan session: camera lifecycle plus the scan loop.
//!
//! A session moves `Idle → Starting → Active → Stopped`, and `Stopped`
//! accepts a new start. Only an `Active` session holds a stream. Each start
//! bumps the session [`Ticket`]. Camera completions and scheduled scan
//! steps carry the ticket they were issued under, and anything that arrives
//! with an old ticket (or after a stop) is dropped. A late stream is released
//! instead of being adopted.
//!
//! Starting is split in two (`begin_start` / `finish_start`) so that the
//! browser binding never holds the `RefCell` borrow across the camera
//! `await`. [`start_session`] glues the halves together.

use std::cell::RefCell;
use std::time::Duration;

use serde::Serialize;

use crate::camera::{Camera, CameraStream, FacingMode, StreamRequest};
use crate::config::{Messages, ScannerConfig};
use crate::decode::Decoder;
use crate::error::CameraError;
use crate::schedule::{Delay, Scheduler, Ticket};
use crate::surface::{Controls, Surface};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    /// Camera request in flight. No stream held yet.
    Starting,
    Active,
    /// Restartable, like `Idle`.
    Stopped,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Active => "active",
            Self::Stopped => "stopped",
        }
    }
}

/// Scan counters for the current page lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub frames_scanned: u64,
    pub hits: u64,
    pub misses: u64,
    pub last_payload: Option<String>,
}

pub struct ScanSession<S, D, K, U> {
    state: SessionState,
    ticket: Ticket,
    stream: Option<S>,
    facing: FacingMode,
    cooldown: Duration,
    messages: Messages,
    decoder: D,
    scheduler: K,
    surface: U,
    stats: SessionStats,
}

impl<S, D, K, U> ScanSession<S, D, K, U>
where
    S: CameraStream,
    D: Decoder,
    K: Scheduler,
    U: Surface,
{
    pub fn new(config: &ScannerConfig, decoder: D, scheduler: K, mut surface: U) -> Self {
        surface.set_controls(Controls::IDLE);
        Self {
            state: SessionState::Idle,
            ticket: Ticket::default(),
            stream: None,
            facing: config.facing_mode,
            cooldown: config.cooldown(),
            messages: config.messages.clone(),
            decoder,
            scheduler,
            surface,
            stats: SessionStats::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    #[cfg(test)]
    pub(crate) fn has_stream(&self) -> bool {
        self.stream.is_some()
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Whether a camera result for `ticket` would still be adopted.
    pub fn is_pending(&self, ticket: Ticket) -> bool {
        self.state == SessionState::Starting && ticket == self.ticket
    }

    /// First half of start. Returns `None` when a start is already pending
    /// or the session is active.
    pub fn begin_start(&mut self) -> Option<StreamRequest> {
        match self.state {
            SessionState::Starting | SessionState::Active => {
                tracing::debug!(state = self.state.as_str(), "start ignored");
                None
            }
            SessionState::Idle | SessionState::Stopped => {
                self.ticket = self.ticket.next();
                self.state = SessionState::Starting;
                tracing::info!(ticket = self.ticket.0, facing = ?self.facing, "requesting camera");
                Some(StreamRequest { facing: self.facing, ticket: self.ticket })
            }
        }
    }

    /// Second half of start: adopt the stream or report the failure.
    pub fn finish_start(&mut self, ticket: Ticket, outcome: Result<S, CameraError>) {
        if !self.is_pending(ticket) {
            tracing::debug!(ticket = ticket.0, "camera result arrived after stop");
            if let Ok(mut late) = outcome {
                late.release();
            }
            return;
        }

        match outcome {
            Ok(stream) => {
                self.stream = Some(stream);
                self.state = SessionState::Active;
                self.surface.set_controls(Controls::ACTIVE);
                tracing::info!(ticket = ticket.0, "camera active, scanning");
                self.reschedule(Delay::NextFrame, ticket);
            }
            Err(err) => {
                tracing::warn!(error = %err, "camera access failed");
                self.state = SessionState::Idle;
                self.surface.set_controls(Controls::IDLE);
                self.surface.show(err.user_message());
            }
        }
    }

    /// Release the camera. No-op unless active or starting.
    pub fn stop(&mut self) {
        match self.state {
            SessionState::Active => {
                tracing::info!(ticket = self.ticket.0, "camera stopped");
            }
            SessionState::Starting => {
                tracing::info!(ticket = self.ticket.0, "start cancelled");
            }
            SessionState::Idle | SessionState::Stopped => return,
        }
        let message = self.messages.stopped.clone();
        self.shut_down(&message);
    }

    /// One step of the scan loop. Called by the scheduler.
    pub fn scan_frame(&mut self, ticket: Ticket) {
        if self.state != SessionState::Active || ticket != self.ticket {
            tracing::trace!(ticket = ticket.0, "stale scan step dropped");
            return;
        }
        let Some(stream) = self.stream.as_mut() else {
            return;
        };

        let Some(frame) = stream.capture() else {
            // Video has no dimensions yet.
            self.reschedule(Delay::NextFrame, ticket);
            return;
        };

        self.stats.frames_scanned += 1;
        match self.decoder.decode(&frame) {
            Some(payload) => {
                tracing::debug!(len = payload.len(), "QR code decoded");
                self.surface.show(&self.messages.found(&payload));
                self.stats.hits += 1;
                self.stats.last_payload = Some(payload);
                self.reschedule(Delay::After(self.cooldown), ticket);
            }
            None => {
                self.stats.misses += 1;
                self.reschedule(Delay::NextFrame, ticket);
            }
        }
    }

    /// Arm the next step. If nothing can be armed the loop is dead, so the
    /// camera is released rather than left running.
    fn reschedule(&mut self, delay: Delay, ticket: Ticket) {
        if let Err(err) = self.scheduler.schedule(delay, ticket) {
            tracing::error!(error = %err, ?delay, "scan loop halted");
            let message = self.messages.scan_failed.clone();
            self.shut_down(&message);
        }
    }

    fn shut_down(&mut self, message: &str) {
        if let Some(mut stream) = self.stream.take() {
            stream.release();
        }
        self.state = SessionState::Stopped;
        self.surface.set_controls(Controls::IDLE);
        self.surface.show(message);
    }
}

/// Full start: request the camera, show it if the request is still current,
/// and hand the result back to the session.
///
/// The session borrow is released while the camera request and playback
/// are pending, so `stop()` may run in between. A stream whose request went
/// stale is never attached to the display.
pub async fn start_session<C, D, K, U>(
    session: &RefCell<ScanSession<C::Stream, D, K, U>>,
    camera: &C,
) where
    C: Camera,
    D: Decoder,
    K: Scheduler,
    U: Surface,
{
    let Some(request) = session.borrow_mut().begin_start() else {
        return;
    };
    let outcome = match camera.open(&request).await {
        Ok(mut stream) if session.borrow().is_pending(request.ticket) => {
            match stream.attach().await {
                Ok(()) => Ok(stream),
                Err(err) => {
                    stream.release();
                    Err(err)
                }
            }
        }
        other => other,
    };
    session.borrow_mut().finish_start(request.ticket, outcome);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Frame;
    use crate::error::ScheduleError;
    use std::cell::Cell;
    use std::collections::{HashSet, VecDeque};
    use std::pin::{Pin, pin};
    use std::rc::Rc;
    use std::task::{Context, Poll, Waker};

    // ── Fakes ──────────────────────────────────────────────────────

    /// Shared record of everything the fakes observed.
    #[derive(Default)]
    struct Recorder {
        open_streams: Cell<i32>,
        releases: Cell<u32>,
        attaches: Cell<u32>,
        decodes: Cell<u32>,
        video_ready: Cell<bool>,
        attach_fails: Cell<bool>,
        schedule_fails: Cell<bool>,
        /// Id of the stream the video element currently shows.
        display: Cell<Option<u64>>,
        pending: RefCell<VecDeque<(Delay, Ticket)>>,
        controls: Cell<Option<Controls>>,
        messages: RefCell<Vec<String>>,
    }

    impl Recorder {
        fn new() -> Rc<Self> {
            let rec = Rc::new(Self::default());
            rec.video_ready.set(true);
            rec
        }

        fn last_message(&self) -> Option<String> {
            self.messages.borrow().last().cloned()
        }

        fn pop(&self) -> Option<(Delay, Ticket)> {
            self.pending.borrow_mut().pop_front()
        }
    }

    /// Shares one display between all streams, like the page's `<video>`.
    struct FakeStream {
        rec: Rc<Recorder>,
        id: u64,
    }

    impl CameraStream for FakeStream {
        async fn attach(&mut self) -> Result<(), CameraError> {
            if self.rec.attach_fails.get() {
                return Err(CameraError::Playback("NotAllowedError".into()));
            }
            self.rec.attaches.set(self.rec.attaches.get() + 1);
            self.rec.display.set(Some(self.id));
            Ok(())
        }

        fn capture(&mut self) -> Option<Frame> {
            if !self.rec.video_ready.get() || self.rec.display.get() != Some(self.id) {
                return None;
            }
            Frame::new(vec![0; 4 * 4 * 4], 4, 4)
        }

        fn release(&mut self) {
            self.rec.releases.set(self.rec.releases.get() + 1);
            self.rec.open_streams.set(self.rec.open_streams.get() - 1);
            if self.rec.display.get() == Some(self.id) {
                self.rec.display.set(None);
            }
        }
    }

    /// Hands out streams whose id is the request ticket. Requests whose
    /// ticket is held stay pending until [`FakeCamera::unhold`].
    struct FakeCamera {
        rec: Rc<Recorder>,
        failures: RefCell<VecDeque<CameraError>>,
        held: RefCell<HashSet<Ticket>>,
    }

    impl FakeCamera {
        fn new(rec: &Rc<Recorder>) -> Self {
            Self {
                rec: Rc::clone(rec),
                failures: RefCell::new(VecDeque::new()),
                held: RefCell::new(HashSet::new()),
            }
        }

        fn failing(rec: &Rc<Recorder>, err: CameraError) -> Self {
            let camera = Self::new(rec);
            camera.failures.borrow_mut().push_back(err);
            camera
        }

        fn hold(&self, ticket: Ticket) {
            self.held.borrow_mut().insert(ticket);
        }

        fn unhold(&self, ticket: Ticket) {
            self.held.borrow_mut().remove(&ticket);
        }
    }

    impl Camera for FakeCamera {
        type Stream = FakeStream;

        async fn open(&self, request: &StreamRequest) -> Result<FakeStream, CameraError> {
            let ticket = request.ticket;
            std::future::poll_fn(|_| {
                if self.held.borrow().contains(&ticket) {
                    Poll::Pending
                } else {
                    Poll::Ready(())
                }
            })
            .await;

            if let Some(err) = self.failures.borrow_mut().pop_front() {
                return Err(err);
            }
            self.rec.open_streams.set(self.rec.open_streams.get() + 1);
            Ok(FakeStream { rec: Rc::clone(&self.rec), id: ticket.0 })
        }
    }

    /// Returns `hits` in order, then misses forever.
    struct ScriptedDecoder {
        rec: Rc<Recorder>,
        hits: VecDeque<Option<String>>,
    }

    impl Decoder for ScriptedDecoder {
        fn decode(&mut self, _frame: &Frame) -> Option<String> {
            self.rec.decodes.set(self.rec.decodes.get() + 1);
            self.hits.pop_front().flatten()
        }
    }

    struct QueueScheduler(Rc<Recorder>);

    impl Scheduler for QueueScheduler {
        fn schedule(&mut self, delay: Delay, ticket: Ticket) -> Result<(), ScheduleError> {
            if self.0.schedule_fails.get() {
                return Err(ScheduleError("requestAnimationFrame unavailable".into()));
            }
            self.0.pending.borrow_mut().push_back((delay, ticket));
            Ok(())
        }
    }

    struct RecordingSurface(Rc<Recorder>);

    impl Surface for RecordingSurface {
        fn set_controls(&mut self, controls: Controls) {
            self.0.controls.set(Some(controls));
        }

        fn show(&mut self, message: &str) {
            self.0.messages.borrow_mut().push(message.to_string());
        }
    }

    type TestSession = ScanSession<FakeStream, ScriptedDecoder, QueueScheduler, RecordingSurface>;

    fn session_with(rec: &Rc<Recorder>, hits: Vec<Option<&str>>) -> RefCell<TestSession> {
        let decoder = ScriptedDecoder {
            rec: Rc::clone(rec),
            hits: hits.into_iter().map(|h| h.map(str::to_string)).collect(),
        };
        RefCell::new(ScanSession::new(
            &ScannerConfig::default(),
            decoder,
            QueueScheduler(Rc::clone(rec)),
            RecordingSurface(Rc::clone(rec)),
        ))
    }

    fn poll_once<F: Future>(future: Pin<&mut F>) -> Poll<F::Output> {
        future.poll(&mut Context::from_waker(Waker::noop()))
    }

    fn block_on<F: Future>(future: F) -> F::Output {
        let mut future = pin!(future);
        loop {
            if let Poll::Ready(out) = poll_once(future.as_mut()) {
                return out;
            }
        }
    }

    /// Run the next scheduled step, as the browser callback would.
    fn fire_next(rec: &Recorder, session: &RefCell<TestSession>) -> Option<Delay> {
        let (delay, ticket) = rec.pop()?;
        session.borrow_mut().scan_frame(ticket);
        Some(delay)
    }

    fn assert_stream_matches_state(rec: &Recorder, session: &RefCell<TestSession>) {
        let s = session.borrow();
        assert_eq!(s.has_stream(), s.is_active());
        assert_eq!(rec.open_streams.get(), i32::from(s.is_active()));
        assert_eq!(rec.display.get().is_some(), s.is_active());
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    #[test]
    fn new_session_is_idle_with_start_enabled() {
        let rec = Recorder::new();
        let session = session_with(&rec, vec![]);
        assert_eq!(session.borrow().state(), SessionState::Idle);
        assert_eq!(rec.controls.get(), Some(Controls::IDLE));
        assert!(rec.messages.borrow().is_empty());
    }

    #[test]
    fn start_activates_and_schedules_first_scan() {
        let rec = Recorder::new();
        let session = session_with(&rec, vec![]);
        block_on(start_session(&session, &FakeCamera::new(&rec)));

        assert_eq!(session.borrow().state(), SessionState::Active);
        assert_eq!(rec.controls.get(), Some(Controls::ACTIVE));
        assert_eq!(rec.open_streams.get(), 1);
        assert_eq!(rec.display.get(), Some(1));
        assert_eq!(rec.pending.borrow().len(), 1);
        assert_eq!(rec.pending.borrow()[0].0, Delay::NextFrame);
    }

    #[test]
    fn start_failure_reports_error_and_stays_idle() {
        let rec = Recorder::new();
        let session = session_with(&rec, vec![]);
        let camera = FakeCamera::failing(&rec, CameraError::PermissionDenied);
        block_on(start_session(&session, &camera));

        assert_eq!(session.borrow().state(), SessionState::Idle);
        assert_eq!(rec.controls.get(), Some(Controls::IDLE));
        let message = rec.last_message().unwrap();
        assert!(!message.is_empty());
        assert!(rec.pending.borrow().is_empty());
        assert_stream_matches_state(&rec, &session);
    }

    #[test]
    fn start_after_failure_can_succeed() {
        let rec = Recorder::new();
        let session = session_with(&rec, vec![]);
        let camera = FakeCamera::failing(&rec, CameraError::DeviceBusy);
        block_on(start_session(&session, &camera));
        block_on(start_session(&session, &camera));
        assert!(session.borrow().is_active());
    }

    #[test]
    fn playback_failure_releases_the_stream() {
        let rec = Recorder::new();
        rec.attach_fails.set(true);
        let session = session_with(&rec, vec![]);
        block_on(start_session(&session, &FakeCamera::new(&rec)));

        assert_eq!(session.borrow().state(), SessionState::Idle);
        assert_eq!(rec.releases.get(), 1);
        assert_eq!(rec.controls.get(), Some(Controls::IDLE));
        assert_eq!(
            rec.last_message().as_deref(),
            Some(CameraError::Playback(String::new()).user_message())
        );
        assert!(rec.pending.borrow().is_empty());
        assert_stream_matches_state(&rec, &session);
    }

    #[test]
    fn double_start_is_a_noop() {
        let rec = Recorder::new();
        let session = session_with(&rec, vec![]);
        let camera = FakeCamera::new(&rec);
        block_on(start_session(&session, &camera));
        block_on(start_session(&session, &camera));

        assert_eq!(rec.open_streams.get(), 1);
        assert_eq!(rec.pending.borrow().len(), 1);
    }

    #[test]
    fn stop_releases_stream_and_restores_controls() {
        let rec = Recorder::new();
        let session = session_with(&rec, vec![]);
        block_on(start_session(&session, &FakeCamera::new(&rec)));
        session.borrow_mut().stop();

        assert_eq!(session.borrow().state(), SessionState::Stopped);
        assert_eq!(rec.releases.get(), 1);
        assert_eq!(rec.controls.get(), Some(Controls::IDLE));
        assert_eq!(rec.last_message().as_deref(), Some("Camera stopped"));
        assert_stream_matches_state(&rec, &session);
    }

    #[test]
    fn stop_when_idle_is_a_noop() {
        let rec = Recorder::new();
        let session = session_with(&rec, vec![]);
        session.borrow_mut().stop();
        assert_eq!(session.borrow().state(), SessionState::Idle);
        assert_eq!(rec.releases.get(), 0);
        assert!(rec.messages.borrow().is_empty());

        block_on(start_session(&session, &FakeCamera::new(&rec)));
        session.borrow_mut().stop();
        session.borrow_mut().stop();
        assert_eq!(rec.releases.get(), 1);
        assert_eq!(rec.messages.borrow().len(), 1);
    }

    #[test]
    fn stream_open_iff_active_across_sequences() {
        let rec = Recorder::new();
        let session = session_with(&rec, vec![]);
        let camera = FakeCamera::new(&rec);
        let steps = [true, true, false, false, true, false, true, false, false, true];
        for start in steps {
            if start {
                block_on(start_session(&session, &camera));
            } else {
                session.borrow_mut().stop();
            }
            assert_stream_matches_state(&rec, &session);
        }
    }

    #[test]
    fn stop_during_acquisition_releases_late_stream() {
        let rec = Recorder::new();
        let session = session_with(&rec, vec![]);
        let camera = FakeCamera::new(&rec);
        camera.hold(Ticket(1));

        let mut start = pin!(start_session(&session, &camera));
        assert!(poll_once(start.as_mut()).is_pending());
        assert_eq!(session.borrow().state(), SessionState::Starting);
        session.borrow_mut().stop();
        assert_eq!(session.borrow().state(), SessionState::Stopped);

        camera.unhold(Ticket(1));
        block_on(start);

        assert_eq!(session.borrow().state(), SessionState::Stopped);
        assert_eq!(rec.releases.get(), 1);
        assert_eq!(rec.attaches.get(), 0);
        assert!(rec.pending.borrow().is_empty());
        assert_stream_matches_state(&rec, &session);
    }

    #[test]
    fn restart_during_acquisition_keeps_only_the_newest_stream() {
        let rec = Recorder::new();
        let session = session_with(&rec, vec![]);
        let camera = FakeCamera::new(&rec);

        let first = session.borrow_mut().begin_start().unwrap();
        session.borrow_mut().stop();
        let second = session.borrow_mut().begin_start().unwrap();

        let second_stream = block_on(camera.open(&second));
        session.borrow_mut().finish_start(second.ticket, second_stream);
        let first_stream = block_on(camera.open(&first));
        session.borrow_mut().finish_start(first.ticket, first_stream);

        assert!(session.borrow().is_active());
        assert_eq!(rec.releases.get(), 1);
        assert_eq!(rec.open_streams.get(), 1);
    }

    #[test]
    fn late_stream_from_cancelled_start_leaves_the_display_alone() {
        let rec = Recorder::new();
        let session = session_with(&rec, vec![]);
        let camera = FakeCamera::new(&rec);
        camera.hold(Ticket(1));

        let mut first = pin!(start_session(&session, &camera));
        assert!(poll_once(first.as_mut()).is_pending());
        session.borrow_mut().stop();
        block_on(start_session(&session, &camera));
        assert_eq!(rec.display.get(), Some(2));

        camera.unhold(Ticket(1));
        block_on(first);

        assert!(session.borrow().is_active());
        assert_eq!(rec.display.get(), Some(2));
        assert_eq!(rec.attaches.get(), 1);
        assert_eq!(rec.releases.get(), 1);
        assert_stream_matches_state(&rec, &session);

        fire_next(&rec, &session);
        assert_eq!(rec.decodes.get(), 1);
        assert_eq!(session.borrow().stats().frames_scanned, 1);
    }

    // ── Scan loop ──────────────────────────────────────────────────

    #[test]
    fn scheduled_step_after_stop_does_nothing() {
        let rec = Recorder::new();
        let session = session_with(&rec, vec![]);
        block_on(start_session(&session, &FakeCamera::new(&rec)));
        session.borrow_mut().stop();

        assert_eq!(fire_next(&rec, &session), Some(Delay::NextFrame));
        assert_eq!(rec.decodes.get(), 0);
        assert!(rec.pending.borrow().is_empty());
    }

    #[test]
    fn step_from_previous_session_is_dropped_after_restart() {
        let rec = Recorder::new();
        let session = session_with(&rec, vec![]);
        let camera = FakeCamera::new(&rec);
        block_on(start_session(&session, &camera));
        let (_, old_ticket) = rec.pop().unwrap();
        session.borrow_mut().stop();
        block_on(start_session(&session, &camera));

        session.borrow_mut().scan_frame(old_ticket);
        assert_eq!(rec.decodes.get(), 0);
        assert_eq!(rec.pending.borrow().len(), 1);

        fire_next(&rec, &session);
        assert_eq!(rec.decodes.get(), 1);
        assert_eq!(rec.pending.borrow().len(), 1);
    }

    #[test]
    fn hit_shows_payload_then_waits_for_cooldown() {
        let rec = Recorder::new();
        let session = session_with(&rec, vec![Some("ABC123")]);
        block_on(start_session(&session, &FakeCamera::new(&rec)));

        fire_next(&rec, &session);
        assert_eq!(rec.decodes.get(), 1);
        assert!(rec.last_message().unwrap().contains("ABC123"));

        let pending: Vec<_> = rec.pending.borrow().iter().copied().collect();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].0, Delay::After(Duration::from_secs(1)));
        assert_eq!(rec.decodes.get(), 1);

        // Cooldown elapses: scanning resumes with a miss.
        assert_eq!(fire_next(&rec, &session), Some(Delay::After(Duration::from_secs(1))));
        assert_eq!(rec.decodes.get(), 2);
        assert_eq!(rec.pop().map(|(d, _)| d), Some(Delay::NextFrame));

        let stats = session.borrow().stats().clone();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.last_payload.as_deref(), Some("ABC123"));
    }

    #[test]
    fn miss_reschedules_every_frame_with_one_decode_per_step() {
        let rec = Recorder::new();
        let session = session_with(&rec, vec![]);
        block_on(start_session(&session, &FakeCamera::new(&rec)));

        for step in 1..=50 {
            assert_eq!(rec.pending.borrow().len(), 1);
            fire_next(&rec, &session);
            assert_eq!(rec.decodes.get(), step);
            assert_eq!(rec.pending.borrow().back().map(|(d, _)| *d), Some(Delay::NextFrame));
        }
        assert!(rec.messages.borrow().is_empty());

        session.borrow_mut().stop();
        fire_next(&rec, &session);
        assert_eq!(rec.decodes.get(), 50);
        assert!(rec.pending.borrow().is_empty());
    }

    #[test]
    fn stop_during_cooldown_ends_the_loop() {
        let rec = Recorder::new();
        let session = session_with(&rec, vec![Some("ABC123")]);
        block_on(start_session(&session, &FakeCamera::new(&rec)));
        fire_next(&rec, &session);
        session.borrow_mut().stop();

        assert!(matches!(fire_next(&rec, &session), Some(Delay::After(_))));
        assert_eq!(rec.decodes.get(), 1);
        assert!(rec.pending.borrow().is_empty());
    }

    #[test]
    fn video_not_ready_retries_without_decoding() {
        let rec = Recorder::new();
        rec.video_ready.set(false);
        let session = session_with(&rec, vec![]);
        block_on(start_session(&session, &FakeCamera::new(&rec)));

        fire_next(&rec, &session);
        assert_eq!(rec.decodes.get(), 0);
        assert_eq!(rec.pending.borrow().len(), 1);
        assert_eq!(session.borrow().stats().frames_scanned, 0);

        rec.video_ready.set(true);
        fire_next(&rec, &session);
        assert_eq!(rec.decodes.get(), 1);
    }

    #[test]
    fn unschedulable_first_step_shuts_the_camera_down() {
        let rec = Recorder::new();
        rec.schedule_fails.set(true);
        let session = session_with(&rec, vec![]);
        block_on(start_session(&session, &FakeCamera::new(&rec)));

        assert_eq!(session.borrow().state(), SessionState::Stopped);
        assert_eq!(rec.releases.get(), 1);
        assert_eq!(rec.controls.get(), Some(Controls::IDLE));
        assert_eq!(
            rec.last_message().as_deref(),
            Some(ScannerConfig::default().messages.scan_failed.as_str())
        );
        assert_stream_matches_state(&rec, &session);
    }

    #[test]
    fn scheduler_failure_mid_loop_stops_and_allows_restart() {
        let rec = Recorder::new();
        let session = session_with(&rec, vec![]);
        let camera = FakeCamera::new(&rec);
        block_on(start_session(&session, &camera));
        fire_next(&rec, &session);
        assert_eq!(rec.decodes.get(), 1);

        rec.schedule_fails.set(true);
        fire_next(&rec, &session);
        assert_eq!(session.borrow().state(), SessionState::Stopped);
        assert_eq!(rec.releases.get(), 1);
        assert!(rec.pending.borrow().is_empty());
        assert_stream_matches_state(&rec, &session);

        rec.schedule_fails.set(false);
        block_on(start_session(&session, &camera));
        assert!(session.borrow().is_active());
        assert_eq!(rec.pending.borrow().len(), 1);
    }

    #[test]
    fn state_names_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&SessionState::Active).unwrap(), "\"active\"");
        assert_eq!(SessionState::Starting.as_str(), "starting");
    }
}
