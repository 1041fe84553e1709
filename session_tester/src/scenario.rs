// THEORY:
// A scenario is a recorded (or hand-written) capture session: timed face detections
// for the capture screen and timed metering samples for the voice screen. Replaying
// one through the library exercises the same code paths a live camera and recorder
// would, without either being present.

use anyhow::{Context, Result, bail};
use dwell_sense::core_modules::bounding_box::BoundingBox;
use dwell_sense::pipeline::Permission;
use serde::Deserialize;
use std::path::Path;

const DEFAULT_LINGER_MS: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionSetting {
    #[default]
    Granted,
    Denied,
}

impl From<PermissionSetting> for Permission {
    fn from(setting: PermissionSetting) -> Self {
        match setting {
            PermissionSetting::Granted => Permission::Granted,
            PermissionSetting::Denied => Permission::Denied,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FrameEvent {
    pub at_ms: u64,
    #[serde(default)]
    pub faces: Vec<BoundingBox>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SampleEvent {
    pub at_ms: u64,
    pub level: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FailureEvent {
    pub at_ms: u64,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FaceScript {
    pub frame_width: f64,
    pub frame_height: f64,
    #[serde(default)]
    pub permission: PermissionSetting,
    #[serde(default)]
    pub frames: Vec<FrameEvent>,
    #[serde(default)]
    pub failures: Vec<FailureEvent>,
    /// Times at which the user presses the reset button.
    #[serde(default)]
    pub reset_at_ms: Vec<u64>,
    /// When to close the session. Defaults to one second after the last event.
    pub end_at_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VoiceScript {
    #[serde(default)]
    pub permission: PermissionSetting,
    #[serde(default)]
    pub start_at_ms: u64,
    pub stop_at_ms: Option<u64>,
    #[serde(default)]
    pub samples: Vec<SampleEvent>,
    #[serde(default)]
    pub failures: Vec<FailureEvent>,
    pub end_at_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub face: Option<FaceScript>,
    pub voice: Option<VoiceScript>,
}

impl FaceScript {
    pub fn end_at_ms(&self) -> u64 {
        let last = self
            .frames
            .iter()
            .map(|f| f.at_ms)
            .chain(self.failures.iter().map(|f| f.at_ms))
            .chain(self.reset_at_ms.iter().copied())
            .max()
            .unwrap_or(0);
        self.end_at_ms.unwrap_or(last + DEFAULT_LINGER_MS)
    }
}

impl VoiceScript {
    pub fn end_at_ms(&self) -> u64 {
        let last = self
            .samples
            .iter()
            .map(|s| s.at_ms)
            .chain(self.failures.iter().map(|f| f.at_ms))
            .chain(self.stop_at_ms)
            .chain([self.start_at_ms])
            .max()
            .unwrap_or(0);
        self.end_at_ms.unwrap_or(last + DEFAULT_LINGER_MS)
    }
}

impl Scenario {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut scenario: Scenario = toml::from_str(raw).context("malformed scenario")?;

        if let Some(face) = scenario.face.as_mut() {
            if !(face.frame_width > 0.0 && face.frame_height > 0.0) {
                bail!(
                    "face frame size must be positive, got {}x{}",
                    face.frame_width,
                    face.frame_height
                );
            }
            face.frames.sort_by_key(|f| f.at_ms);
            face.failures.sort_by_key(|f| f.at_ms);
            face.reset_at_ms.sort_unstable();
        }
        if let Some(voice) = scenario.voice.as_mut() {
            voice.samples.sort_by_key(|s| s.at_ms);
            voice.failures.sort_by_key(|f| f.at_ms);
        }
        if scenario.face.is_none() && scenario.voice.is_none() {
            bail!("scenario has neither a [face] nor a [voice] section");
        }
        Ok(scenario)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("in scenario {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_orders_events() {
        let scenario = Scenario::from_toml_str(
            r#"
            [face]
            frame_width = 720
            frame_height = 1280
            reset_at_ms = [2000]

            [[face.frames]]
            at_ms = 500
            faces = [{ x = 10, y = 10, width = 100, height = 100 }]

            [[face.frames]]
            at_ms = 0

            [voice]
            permission = "denied"

            [[voice.samples]]
            at_ms = 100
            level = -40.0
            "#,
        )
        .unwrap();

        let face = scenario.face.unwrap();
        assert_eq!(face.frames[0].at_ms, 0);
        assert_eq!(face.frames[1].faces.len(), 1);
        assert_eq!(face.reset_at_ms, vec![2_000]);
        assert_eq!(face.end_at_ms(), 3_000);

        let voice = scenario.voice.unwrap();
        assert_eq!(voice.permission, PermissionSetting::Denied);
        assert_eq!(voice.end_at_ms(), 1_100);
    }

    #[test]
    fn bundled_demo_parses() {
        let scenario = Scenario::from_toml_str(include_str!("../scenarios/demo.toml")).unwrap();
        let voice = scenario.voice.unwrap();
        assert_eq!(voice.stop_at_ms, Some(20_000));
        assert_eq!(voice.end_at_ms(), 21_000);
        assert!(scenario.face.unwrap().frames.iter().any(|f| f.faces.is_empty()));
    }

    #[test]
    fn rejects_empty_scenario() {
        assert!(Scenario::from_toml_str("").is_err());
    }

    #[test]
    fn rejects_degenerate_frame() {
        let raw = "[face]\nframe_width = 0\nframe_height = 100\n";
        assert!(Scenario::from_toml_str(raw).is_err());
    }
}
