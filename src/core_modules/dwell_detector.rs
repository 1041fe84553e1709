// THEORY:
// The `DwellZoneDetector` adds the concept of "continuity" on top of per-frame face
// detections. A single frame only says whether some face sits inside the target zone;
// the detector remembers whether that has been true without interruption and counts
// down a dwell period while it is.
//
// Key architectural principles:
// 1.  **Two inputs, one state**: frames arrive at whatever rate the camera delivers
//     them and only decide membership. The countdown is advanced by a separate
//     one-second tick, so confirmation depends on wall-clock time, not frame rate.
// 2.  **Continuous dwell**: any frame in which no face qualifies cancels the countdown
//     and restores the full dwell period. There is no grace period.
// 3.  **Terminal confirmation**: once the countdown reaches zero while the face is
//     still inside, the detector latches `confirmed` and ignores all further input
//     until it is explicitly reset.
// 4.  **Events for the controller**: every operation returns the new snapshot plus an
//     optional `DwellEvent`, which the owning controller uses to start or cancel its
//     ticker and to raise the confirmation alert.

use crate::core_modules::bounding_box::{BoundingBox, NormalizedRect};
use crate::core_modules::zone::{Zone, overlap_fraction};
use crate::error::{Error, Result};
use tracing::{debug, info};

pub const DEFAULT_OVERLAP_THRESHOLD: f64 = 0.75; // Share of the face that must be inside the zone.
pub const DEFAULT_DWELL_SECONDS: u32 = 5;

/// Snapshot of the detector after an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DwellState {
    /// At least one face in the last frame qualified.
    pub inside_zone: bool,
    /// Whole seconds left before confirmation. Equals the dwell period whenever the countdown is idle.
    pub seconds_remaining: u32,
    /// The countdown is running. Implies `inside_zone`.
    pub timer_active: bool,
    /// Terminal: the face stayed inside for the full dwell period.
    pub confirmed: bool,
    /// Number of faces reported in the last frame.
    pub faces_detected: usize,
}

impl DwellState {
    fn initial(dwell_seconds: u32) -> Self {
        Self {
            inside_zone: false,
            seconds_remaining: dwell_seconds,
            timer_active: false,
            confirmed: false,
            faces_detected: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DwellEvent {
    /// A face entered the zone; the one-second ticker should start.
    CountdownStarted,
    /// The face left the zone; the ticker should stop.
    CountdownCancelled,
    /// The dwell period elapsed with the face still inside.
    Confirmed,
}

#[derive(Debug, Clone)]
pub struct DwellZoneDetector {
    zone: Zone,
    zone_rect: NormalizedRect,
    overlap_threshold: f64,
    dwell_seconds: u32,
    state: DwellState,
}

impl DwellZoneDetector {
    pub fn configure(zone: Zone, overlap_threshold: f64, dwell_seconds: u32) -> Result<Self> {
        zone.validate()?;
        if !(overlap_threshold > 0.0 && overlap_threshold <= 1.0) {
            return Err(Error::invalid(format!(
                "overlap threshold must be in (0, 1], got {overlap_threshold}"
            )));
        }
        if dwell_seconds == 0 {
            return Err(Error::invalid("dwell period must be at least one second"));
        }

        Ok(Self {
            zone,
            zone_rect: zone.rect(),
            overlap_threshold,
            dwell_seconds,
            state: DwellState::initial(dwell_seconds),
        })
    }

    /// A detector over `zone` with the default 75% threshold and 5 second dwell.
    pub fn with_defaults(zone: Zone) -> Result<Self> {
        Self::configure(zone, DEFAULT_OVERLAP_THRESHOLD, DEFAULT_DWELL_SECONDS)
    }

    pub fn zone(&self) -> &Zone {
        &self.zone
    }

    pub fn dwell_seconds(&self) -> u32 {
        self.dwell_seconds
    }

    pub fn state(&self) -> DwellState {
        self.state
    }

    /// Share of `face` inside the zone for a frame of the given pixel size.
    pub fn overlap(&self, face: &BoundingBox, frame_width: f64, frame_height: f64) -> f64 {
        overlap_fraction(&face.normalize(frame_width, frame_height), &self.zone_rect)
    }

    fn qualifies(&self, face: &BoundingBox, frame_width: f64, frame_height: f64) -> bool {
        self.overlap(face, frame_width, frame_height) >= self.overlap_threshold
    }

    /// Evaluates one frame worth of detections.
    pub fn on_frame(
        &mut self,
        faces: &[BoundingBox],
        frame_width: f64,
        frame_height: f64,
    ) -> (DwellState, Option<DwellEvent>) {
        if self.state.confirmed {
            return (self.state, None);
        }

        self.state.faces_detected = faces.len();
        let inside = faces
            .iter()
            .any(|face| self.qualifies(face, frame_width, frame_height));

        let event = match (self.state.inside_zone, inside) {
            (false, true) => {
                self.state.inside_zone = true;
                self.state.timer_active = true;
                self.state.seconds_remaining = self.dwell_seconds;
                debug!(faces = faces.len(), "face entered zone, dwell countdown started");
                Some(DwellEvent::CountdownStarted)
            }
            (true, false) => {
                self.state.inside_zone = false;
                self.state.timer_active = false;
                self.state.seconds_remaining = self.dwell_seconds;
                debug!(faces = faces.len(), "face left zone, dwell countdown cancelled");
                Some(DwellEvent::CountdownCancelled)
            }
            (true, true) => None,
            (false, false) => {
                self.state.timer_active = false;
                self.state.seconds_remaining = self.dwell_seconds;
                None
            }
        };

        (self.state, event)
    }

    /// Advances the countdown by one second. A no-op unless the countdown is running.
    pub fn on_tick(&mut self) -> (DwellState, Option<DwellEvent>) {
        if self.state.confirmed || !self.state.timer_active || !self.state.inside_zone {
            return (self.state, None);
        }

        self.state.seconds_remaining = self.state.seconds_remaining.saturating_sub(1);
        if self.state.seconds_remaining > 0 {
            return (self.state, None);
        }

        self.state.confirmed = true;
        self.state.timer_active = false;
        info!(dwell_seconds = self.dwell_seconds, "dwell confirmed");
        (self.state, Some(DwellEvent::Confirmed))
    }

    pub fn reset(&mut self) -> DwellState {
        self.state = DwellState::initial(self.dwell_seconds);
        self.state
    }
}
