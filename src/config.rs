// THEORY:
// Every tunable of both screens lives in one `AppConfig`, loadable from TOML.
// Every field has a default taken from the capture and voice screens, so an empty
// file (or no file at all) yields the stock behavior. Validation is delegated to
// the constructors of the trackers themselves, so there is exactly one place that
// decides what a legal configuration is.

use crate::core_modules::band_tracker::{
    DEFAULT_LOW_BAND_SUSTAIN, DEFAULT_SESSION_SECONDS, SoundBandTracker,
};
use crate::core_modules::dwell_detector::{
    DEFAULT_DWELL_SECONDS, DEFAULT_OVERLAP_THRESHOLD, DwellZoneDetector,
};
use crate::core_modules::sound_band::BandBoundaries;
use crate::core_modules::zone::Zone;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Delay between starting a voice session and asking the recorder to start.
pub const DEFAULT_RECORDER_START_DELAY_MS: u64 = 50;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub dwell: DwellConfig,
    pub sound: SoundConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DwellConfig {
    pub zone: Zone,
    pub overlap_threshold: f64,
    pub dwell_seconds: u32,
}

impl Default for DwellConfig {
    fn default() -> Self {
        Self {
            zone: Zone::default(),
            overlap_threshold: DEFAULT_OVERLAP_THRESHOLD,
            dwell_seconds: DEFAULT_DWELL_SECONDS,
        }
    }
}

impl DwellConfig {
    pub fn build_detector(&self) -> Result<DwellZoneDetector> {
        DwellZoneDetector::configure(self.zone, self.overlap_threshold, self.dwell_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SoundConfig {
    pub bands: BandBoundaries,
    pub session_seconds: u32,
    pub low_band_sustain_ms: u64,
    pub recorder_start_delay_ms: u64,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            bands: BandBoundaries::default(),
            session_seconds: DEFAULT_SESSION_SECONDS,
            low_band_sustain_ms: DEFAULT_LOW_BAND_SUSTAIN.as_millis() as u64,
            recorder_start_delay_ms: DEFAULT_RECORDER_START_DELAY_MS,
        }
    }
}

impl SoundConfig {
    pub fn build_tracker(&self) -> Result<SoundBandTracker> {
        SoundBandTracker::configure(
            self.bands,
            self.session_seconds,
            Duration::from_millis(self.low_band_sustain_ms),
        )
    }

    pub fn recorder_start_delay(&self) -> Duration {
        Duration::from_millis(self.recorder_start_delay_ms)
    }
}

impl AppConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        self.dwell.build_detector()?;
        self.sound.build_tracker()?;
        Ok(())
    }
}
