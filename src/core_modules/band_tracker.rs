// THEORY:
// The `SoundBandTracker` drives a fixed-length voice test. Two clocks feed it:
// metering samples, at whatever rate the recorder reports them, and a one-second
// session tick. The samples decide which loudness band the speaker is in; the tick
// counts the session down to completion.
//
// The one piece of memory beyond the current band is the "sustained quiet" episode.
// When the speaker stays in the quiet band (band 1) for the sustain period, the
// tracker raises a one-time low-signal event and gives the speaker a fresh session:
// the countdown restarts from the full duration. The episode only re-arms when the
// band actually changes away from band 1, so one long mumble produces one alert.
//
// Sustain is measured with the caller's timestamps, never by counting samples, so
// the behavior does not depend on the metering rate.

use crate::core_modules::sound_band::{Band, BandBoundaries};
use crate::error::{Error, Result};
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub const DEFAULT_SESSION_SECONDS: u32 = 30;
pub const DEFAULT_LOW_BAND_SUSTAIN: Duration = Duration::from_secs(3);

/// Snapshot of the tracker after an operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandState {
    pub current_band: Band,
    /// Start of the current quiet episode. Only set while in band 1 with no alert shown yet.
    pub low_band_since: Option<Instant>,
    /// The low-signal alert already fired for the current quiet episode.
    pub low_alert_shown: bool,
    /// Always within `[0, session_seconds]`.
    pub seconds_remaining: u32,
    pub running: bool,
    /// Terminal: the countdown reached zero.
    pub completed: bool,
    /// Most recent metering value, recorded even while the session is idle.
    pub last_level: Option<f64>,
}

impl BandState {
    fn initial(session_seconds: u32) -> Self {
        Self {
            current_band: Band::NONE,
            low_band_since: None,
            low_alert_shown: false,
            seconds_remaining: session_seconds,
            running: false,
            completed: false,
            last_level: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandEvent {
    /// Quiet for the whole sustain period. The session countdown was restored to full.
    LowSignalSustained,
    /// The countdown reached zero and the session stopped.
    SessionComplete,
}

#[derive(Debug, Clone)]
pub struct SoundBandTracker {
    boundaries: BandBoundaries,
    session_seconds: u32,
    low_band_sustain: Duration,
    state: BandState,
}

impl SoundBandTracker {
    pub fn configure(
        boundaries: BandBoundaries,
        session_seconds: u32,
        low_band_sustain: Duration,
    ) -> Result<Self> {
        if session_seconds == 0 {
            return Err(Error::invalid("session must last at least one second"));
        }
        Ok(Self {
            boundaries,
            session_seconds,
            low_band_sustain,
            state: BandState::initial(session_seconds),
        })
    }

    pub fn state(&self) -> BandState {
        self.state
    }

    pub fn session_seconds(&self) -> u32 {
        self.session_seconds
    }

    /// Begins a fresh session with the full countdown.
    pub fn start(&mut self) -> BandState {
        let last_level = self.state.last_level;
        self.state = BandState {
            running: true,
            last_level,
            ..BandState::initial(self.session_seconds)
        };
        info!(session_seconds = self.session_seconds, "voice session started");
        self.state
    }

    /// Halts the session and drops any quiet episode in progress. Idempotent.
    pub fn stop(&mut self) -> BandState {
        if self.state.running {
            info!(seconds_remaining = self.state.seconds_remaining, "voice session stopped");
        }
        self.state.running = false;
        self.state.current_band = Band::NONE;
        self.state.low_band_since = None;
        self.state.low_alert_shown = false;
        self.state.seconds_remaining = self.session_seconds;
        self.state
    }

    pub fn reset(&mut self) -> BandState {
        self.state = BandState::initial(self.session_seconds);
        self.state
    }

    pub fn on_sample(&mut self, level: f64, now: Instant) -> (BandState, Option<BandEvent>) {
        self.state.last_level = Some(level);
        if !self.state.running {
            return (self.state, None);
        }

        let band = self.boundaries.classify(level);
        if band != self.state.current_band {
            debug!(from = self.state.current_band.index(), to = band.index(), level, "band changed");
            self.state.current_band = band;
            if band != Band::QUIET {
                self.state.low_band_since = None;
                self.state.low_alert_shown = false;
            }
        }

        if band != Band::QUIET || self.state.low_alert_shown {
            return (self.state, None);
        }

        match self.state.low_band_since {
            None => {
                self.state.low_band_since = Some(now);
                (self.state, None)
            }
            Some(since) if now.saturating_duration_since(since) >= self.low_band_sustain => {
                self.state.low_alert_shown = true;
                self.state.low_band_since = None;
                self.state.seconds_remaining = self.session_seconds;
                info!(
                    sustained_ms = now.saturating_duration_since(since).as_millis() as u64,
                    "low sound sustained, session countdown restored"
                );
                (self.state, Some(BandEvent::LowSignalSustained))
            }
            Some(_) => (self.state, None),
        }
    }

    /// Advances the session countdown by one second.
    pub fn on_tick(&mut self) -> (BandState, Option<BandEvent>) {
        if !self.state.running {
            return (self.state, None);
        }

        self.state.seconds_remaining = self.state.seconds_remaining.saturating_sub(1);
        if self.state.seconds_remaining > 0 {
            return (self.state, None);
        }

        self.state.running = false;
        self.state.completed = true;
        self.state.low_band_since = None;
        info!("voice session complete");
        (self.state, Some(BandEvent::SessionComplete))
    }
}
