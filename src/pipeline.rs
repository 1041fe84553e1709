// THEORY:
// The `pipeline` module is the top-level API the screens talk to. Each session is the
// single owner of one tracker and of the timers that drive it. It turns the trackers'
// snapshots and events into presentation reports: what color the zone outline is,
// what the status line says, how many level circles are lit, and which modal alert
// (if any) is showing.
//
// Sessions never run timers themselves. They ask a `Scheduler` for them and receive
// the firings back through `on_timer`, checking every firing against the handle they
// currently hold, so a firing from a timer that was cancelled or replaced is dropped.
//
// Alerts follow a simple contract: exactly one alert per terminal event, queued
// first-in first-out while another is showing. Acknowledging a dwell confirmation or
// a session completion resets the tracker; acknowledging anything else only
// dismisses it. Starting or resetting a session drops queued alerts that would reset
// it, so a leftover alert from an earlier run can never end the current one.

use crate::config::{DwellConfig, SoundConfig};
use crate::core_modules::band_tracker::{BandEvent, BandState, SoundBandTracker};
use crate::core_modules::bounding_box::{BoundingBox, NormalizedRect};
use crate::core_modules::dwell_detector::{DwellEvent, DwellState, DwellZoneDetector};
use crate::error::{Device, Error, Result};
use crate::scheduler::{Scheduler, TimerFired, TimerHandle, TimerKind};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Outcome of asking the platform for access to a capture device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneColor {
    Green,
    Red,
}

/// A modal notification for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alert {
    DwellConfirmed { dwell_seconds: u32 },
    LowSoundExtended { session_seconds: u32 },
    SessionComplete { session_seconds: u32 },
    /// A camera or recorder failure reported by the platform. Tracker state is untouched.
    CollaboratorFailure(String),
}

impl Alert {
    pub fn title(&self) -> &'static str {
        match self {
            Alert::DwellConfirmed { .. } => "Success!",
            Alert::LowSoundExtended { .. } => "Low Sound Level Detected",
            Alert::SessionComplete { .. } => "Voice Test Complete",
            Alert::CollaboratorFailure(_) => "Error",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Alert::DwellConfirmed { dwell_seconds } => {
                format!("Face detected inside the zone for {dwell_seconds} seconds! Event triggered.")
            }
            Alert::LowSoundExtended { session_seconds } => format!(
                "Sound level has been low for too long. Timer extended to {session_seconds} seconds. Please speak louder."
            ),
            Alert::SessionComplete { session_seconds } => format!(
                "The {session_seconds}-second voice detection test has finished. Thank you for participating!"
            ),
            Alert::CollaboratorFailure(message) => message.clone(),
        }
    }

    /// Whether acknowledging this alert returns the session to its initial state.
    fn resets_session(&self) -> bool {
        matches!(self, Alert::DwellConfirmed { .. } | Alert::SessionComplete { .. })
    }
}

/// FIFO of pending alerts. Every alert gets a sequence number when raised, so a
/// presentation layer can tell two equal alerts shown back to back apart.
#[derive(Debug, Default)]
struct AlertQueue {
    pending: VecDeque<(u64, Alert)>,
    next_id: u64,
}

impl AlertQueue {
    fn push(&mut self, alert: Alert) {
        self.pending.push_back((self.next_id, alert));
        self.next_id += 1;
    }

    fn pop(&mut self) -> Option<Alert> {
        self.pending.pop_front().map(|(_, alert)| alert)
    }

    fn drop_resetting(&mut self) {
        self.pending.retain(|(_, alert)| !alert.resets_session());
    }

    fn showing(&self) -> (Option<Alert>, Option<u64>) {
        match self.pending.front() {
            Some((id, alert)) => (Some(alert.clone()), Some(*id)),
            None => (None, None),
        }
    }
}

/// What the face screen should show after an update.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceReport {
    pub state: DwellState,
    pub zone_color: ZoneColor,
    pub status_text: String,
    /// Faces of the last frame, in fractions of that frame.
    pub faces: Vec<NormalizedRect>,
    /// The alert currently showing, if any.
    pub alert: Option<Alert>,
    /// Sequence number of the showing alert. Changes whenever a different alert is shown.
    pub alert_id: Option<u64>,
}

pub struct FaceDwellSession {
    detector: DwellZoneDetector,
    countdown: Option<TimerHandle>,
    faces: Vec<NormalizedRect>,
    alerts: AlertQueue,
}

impl FaceDwellSession {
    pub fn new(detector: DwellZoneDetector) -> Self {
        Self {
            detector,
            countdown: None,
            faces: Vec::new(),
            alerts: AlertQueue::default(),
        }
    }

    /// Opens a session once the camera permission request has resolved.
    /// No detector is built when access was refused.
    pub fn open(permission: Permission, config: &DwellConfig) -> Result<Self> {
        if permission == Permission::Denied {
            warn!("camera permission denied, face session not started");
            return Err(Error::PermissionDenied(Device::Camera));
        }
        Ok(Self::new(config.build_detector()?))
    }

    pub fn detector(&self) -> &DwellZoneDetector {
        &self.detector
    }

    pub fn on_frame(
        &mut self,
        faces: &[BoundingBox],
        frame_width: f64,
        frame_height: f64,
        scheduler: &mut dyn Scheduler,
    ) -> FaceReport {
        let (_, event) = self.detector.on_frame(faces, frame_width, frame_height);
        self.faces = faces
            .iter()
            .map(|face| face.normalize(frame_width, frame_height))
            .collect();
        self.apply(event, scheduler);
        self.report()
    }

    /// Handles a timer firing. Returns `None` for firings that are not this session's live countdown.
    pub fn on_timer(&mut self, fired: TimerFired, scheduler: &mut dyn Scheduler) -> Option<FaceReport> {
        if fired.kind != TimerKind::DwellCountdown || self.countdown != Some(fired.handle) {
            return None;
        }
        if !scheduler.accept(&fired) {
            return None;
        }

        let (_, event) = self.detector.on_tick();
        self.apply(event, scheduler);
        Some(self.report())
    }

    fn apply(&mut self, event: Option<DwellEvent>, scheduler: &mut dyn Scheduler) {
        match event {
            Some(DwellEvent::CountdownStarted) => {
                self.cancel_countdown(scheduler);
                self.countdown = Some(scheduler.schedule_repeating(TICK_INTERVAL, TimerKind::DwellCountdown));
            }
            Some(DwellEvent::CountdownCancelled) => self.cancel_countdown(scheduler),
            Some(DwellEvent::Confirmed) => {
                self.cancel_countdown(scheduler);
                self.alerts.push(Alert::DwellConfirmed {
                    dwell_seconds: self.detector.dwell_seconds(),
                });
            }
            None => {}
        }
    }

    fn cancel_countdown(&mut self, scheduler: &mut dyn Scheduler) {
        if let Some(handle) = self.countdown.take() {
            scheduler.cancel(handle);
        }
    }

    /// Dismisses the alert that is showing. Dismissing a confirmation re-arms the detector.
    pub fn acknowledge_alert(&mut self, scheduler: &mut dyn Scheduler) -> FaceReport {
        if let Some(alert) = self.alerts.pop() {
            debug!(?alert, "face alert acknowledged");
            if alert.resets_session() {
                self.reset(scheduler);
            }
        }
        self.report()
    }

    /// Surfaces a camera failure to the user without touching the detector.
    pub fn report_failure(&mut self, message: impl Into<String>) -> FaceReport {
        let message = message.into();
        warn!(%message, "camera collaborator failure");
        self.alerts.push(Alert::CollaboratorFailure(message));
        self.report()
    }

    pub fn reset(&mut self, scheduler: &mut dyn Scheduler) -> FaceReport {
        self.cancel_countdown(scheduler);
        self.detector.reset();
        self.faces.clear();
        self.alerts.drop_resetting();
        self.report()
    }

    /// Cancels every timer the session holds. Called when the screen is left.
    pub fn shutdown(&mut self, scheduler: &mut dyn Scheduler) {
        self.cancel_countdown(scheduler);
    }

    pub fn report(&self) -> FaceReport {
        let state = self.detector.state();
        let (alert, alert_id) = self.alerts.showing();
        FaceReport {
            state,
            zone_color: if state.inside_zone {
                ZoneColor::Green
            } else {
                ZoneColor::Red
            },
            status_text: face_status_text(&state),
            faces: self.faces.clone(),
            alert,
            alert_id,
        }
    }
}

fn face_status_text(state: &DwellState) -> String {
    if state.confirmed {
        "Event Triggered!".to_string()
    } else if state.timer_active {
        format!("Face inside! Time left: {}s", state.seconds_remaining)
    } else if state.inside_zone {
        "Face positioned correctly in zone!".to_string()
    } else if state.faces_detected > 0 {
        format!("Face detected ({}) - move inside zone", state.faces_detected)
    } else {
        "Position your face inside the zone".to_string()
    }
}

/// Instruction for the audio recorder collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderCommand {
    Start,
    Stop,
}

/// What the voice screen should show after an update.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceReport {
    pub state: BandState,
    /// Number of level circles lit, 0 to 3.
    pub visible_circles: u8,
    pub status_text: String,
    pub alert: Option<Alert>,
    pub alert_id: Option<u64>,
    /// Set when the recorder should change state as a result of this update.
    pub recorder: Option<RecorderCommand>,
}

pub struct VoiceTestSession {
    tracker: SoundBandTracker,
    ticker: Option<TimerHandle>,
    recorder_start: Option<TimerHandle>,
    recorder_start_delay: Duration,
    alerts: AlertQueue,
}

impl VoiceTestSession {
    pub fn new(tracker: SoundBandTracker, recorder_start_delay: Duration) -> Self {
        Self {
            tracker,
            ticker: None,
            recorder_start: None,
            recorder_start_delay,
            alerts: AlertQueue::default(),
        }
    }

    pub fn from_config(config: &SoundConfig) -> Result<Self> {
        Ok(Self::new(config.build_tracker()?, config.recorder_start_delay()))
    }

    pub fn tracker(&self) -> &SoundBandTracker {
        &self.tracker
    }

    /// Starts a test once the microphone permission request has resolved.
    ///
    /// The session countdown starts immediately; the recorder is asked to start
    /// after a short delay through a later `on_timer` report.
    pub fn start(&mut self, permission: Permission, scheduler: &mut dyn Scheduler) -> Result<VoiceReport> {
        if permission == Permission::Denied {
            warn!("microphone permission denied, voice session not started");
            return Err(Error::PermissionDenied(Device::Microphone));
        }

        self.cancel_timers(scheduler);
        self.alerts.drop_resetting();
        self.tracker.start();
        self.ticker = Some(scheduler.schedule_repeating(TICK_INTERVAL, TimerKind::SessionCountdown));
        self.recorder_start = Some(scheduler.schedule_once(self.recorder_start_delay, TimerKind::RecorderStart));
        Ok(self.report(None))
    }

    pub fn on_sample(&mut self, level: f64, now: Instant, scheduler: &mut dyn Scheduler) -> VoiceReport {
        let (_, event) = self.tracker.on_sample(level, now);
        let recorder = self.apply(event, scheduler);
        self.report(recorder)
    }

    /// Handles a timer firing. Returns `None` for firings this session no longer holds.
    pub fn on_timer(&mut self, fired: TimerFired, scheduler: &mut dyn Scheduler) -> Option<VoiceReport> {
        match fired.kind {
            TimerKind::SessionCountdown if self.ticker == Some(fired.handle) => {
                if !scheduler.accept(&fired) {
                    return None;
                }
                let (_, event) = self.tracker.on_tick();
                let recorder = self.apply(event, scheduler);
                Some(self.report(recorder))
            }
            TimerKind::RecorderStart if self.recorder_start == Some(fired.handle) => {
                if !scheduler.accept(&fired) {
                    return None;
                }
                self.recorder_start = None;
                Some(self.report(Some(RecorderCommand::Start)))
            }
            _ => None,
        }
    }

    fn apply(&mut self, event: Option<BandEvent>, scheduler: &mut dyn Scheduler) -> Option<RecorderCommand> {
        match event {
            Some(BandEvent::LowSignalSustained) => {
                // The countdown restarts from a fresh one-second phase, not from where it was.
                if let Some(handle) = self.ticker.take() {
                    scheduler.cancel(handle);
                }
                self.ticker = Some(scheduler.schedule_repeating(TICK_INTERVAL, TimerKind::SessionCountdown));
                self.alerts.push(Alert::LowSoundExtended {
                    session_seconds: self.tracker.session_seconds(),
                });
                None
            }
            Some(BandEvent::SessionComplete) => {
                self.cancel_timers(scheduler);
                self.alerts.push(Alert::SessionComplete {
                    session_seconds: self.tracker.session_seconds(),
                });
                Some(RecorderCommand::Stop)
            }
            None => None,
        }
    }

    fn cancel_timers(&mut self, scheduler: &mut dyn Scheduler) {
        for handle in [self.ticker.take(), self.recorder_start.take()].into_iter().flatten() {
            scheduler.cancel(handle);
        }
    }

    /// Stops the test and cancels every pending timer. Idempotent.
    pub fn stop(&mut self, scheduler: &mut dyn Scheduler) -> VoiceReport {
        let was_running = self.tracker.state().running;
        self.cancel_timers(scheduler);
        self.tracker.stop();
        self.report(was_running.then_some(RecorderCommand::Stop))
    }

    /// Dismisses the alert that is showing. Dismissing a completion returns the screen to idle,
    /// stopping the recorder if a test was still running.
    pub fn acknowledge_alert(&mut self, scheduler: &mut dyn Scheduler) -> VoiceReport {
        let mut recorder = None;
        if let Some(alert) = self.alerts.pop() {
            debug!(?alert, "voice alert acknowledged");
            if alert.resets_session() {
                if self.tracker.state().running {
                    recorder = Some(RecorderCommand::Stop);
                }
                self.cancel_timers(scheduler);
                self.tracker.reset();
            }
        }
        self.report(recorder)
    }

    /// Surfaces a recorder failure to the user without touching the tracker.
    pub fn report_failure(&mut self, message: impl Into<String>) -> VoiceReport {
        let message = message.into();
        warn!(%message, "audio collaborator failure");
        self.alerts.push(Alert::CollaboratorFailure(message));
        self.report(None)
    }

    pub fn report(&self, recorder: Option<RecorderCommand>) -> VoiceReport {
        let state = self.tracker.state();
        let (alert, alert_id) = self.alerts.showing();
        VoiceReport {
            state,
            visible_circles: if state.running {
                state.current_band.index()
            } else {
                0
            },
            status_text: voice_status_text(&state),
            alert,
            alert_id,
            recorder,
        }
    }
}

fn voice_status_text(state: &BandState) -> String {
    if state.running {
        format!("Listening... Time Remaining: {}s", state.seconds_remaining)
    } else if state.completed {
        "Test complete".to_string()
    } else {
        "Ready to test".to_string()
    }
}
