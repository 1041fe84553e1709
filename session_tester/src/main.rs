mod overlay;
mod scenario;

use anyhow::{Context, Result, bail};
use clap::Parser;
use dwell_sense::config::AppConfig;
use dwell_sense::pipeline::{FaceDwellSession, FaceReport, VoiceReport, VoiceTestSession};
use dwell_sense::runner::{DEFAULT_INPUT_CAPACITY, FaceInput, VoiceInput, spawn_session};
use dwell_sense::Error;
use scenario::{FaceScript, Scenario, VoiceScript};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Replays a scripted capture session through the dwell and sound-level trackers.
#[derive(Debug, Parser)]
#[command(name = "session_tester", version)]
struct Args {
    /// Scenario file with timed face frames and sound samples.
    scenario: PathBuf,

    /// Tracker configuration (TOML). Built-in defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run on a virtual clock: the whole scenario replays instantly with exact timing.
    #[arg(long)]
    virtual_time: bool,

    /// Acknowledge every alert as soon as it is shown.
    #[arg(long)]
    auto_ack: bool,

    /// Write a PNG of the zone overlay for every face report into this directory.
    #[arg(long)]
    snapshots: Option<PathBuf>,

    /// Snapshot width in pixels; height follows the scenario's frame aspect ratio.
    #[arg(long, default_value_t = 360)]
    snapshot_width: u32,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    if args.snapshot_width == 0 {
        bail!("--snapshot-width must be at least 1");
    }
    let config = match &args.config {
        Some(path) => AppConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => AppConfig::default(),
    };
    let scenario = Scenario::load(&args.scenario)?;

    if let Some(dir) = &args.snapshots {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create snapshot directory {}", dir.display()))?;
    }
    if args.virtual_time {
        tokio::time::pause();
    }

    let start = Instant::now();
    let face = async {
        match &scenario.face {
            Some(script) => replay_face(script, &config, &args, start).await,
            None => Ok(()),
        }
    };
    let voice = async {
        match &scenario.voice {
            Some(script) => replay_voice(script, &config, &args, start).await,
            None => Ok(()),
        }
    };

    let (face, voice) = futures::join!(face, voice);
    face?;
    voice?;

    info!(elapsed_ms = start.elapsed().as_millis() as u64, "replay complete");
    Ok(())
}

fn at(start: Instant, at_ms: u64) -> Instant {
    start + Duration::from_millis(at_ms)
}

async fn replay_face(script: &FaceScript, config: &AppConfig, args: &Args, start: Instant) -> Result<()> {
    let session = match FaceDwellSession::open(script.permission.into(), &config.dwell) {
        Ok(session) => session,
        Err(Error::PermissionDenied(device)) => {
            warn!("Permission Denied: {device} access is required for face detection.");
            return Ok(());
        }
        Err(err) => return Err(err).context("building face session"),
    };
    let zone = *session.detector().zone();
    let dwell_seconds = session.detector().dwell_seconds();
    let handle = spawn_session(session, DEFAULT_INPUT_CAPACITY);
    let inputs = handle.inputs;
    let mut reports = handle.reports;
    let ack = inputs.downgrade();

    let feed = async move {
        let frames = script.frames.iter().map(|f| {
            (
                f.at_ms,
                FaceInput::Frame {
                    faces: f.faces.clone(),
                    frame_width: script.frame_width,
                    frame_height: script.frame_height,
                },
            )
        });
        let failures = script
            .failures
            .iter()
            .map(|f| (f.at_ms, FaceInput::Failure(f.message.clone())));
        let resets = script.reset_at_ms.iter().map(|at_ms| (*at_ms, FaceInput::Reset));
        let mut events: Vec<_> = frames.chain(failures).chain(resets).collect();
        events.sort_by_key(|(at_ms, _)| *at_ms);

        for (at_ms, input) in events {
            tokio::time::sleep_until(at(start, at_ms)).await;
            if inputs.send(input).await.is_err() {
                break;
            }
        }
        tokio::time::sleep_until(at(start, script.end_at_ms())).await;
        drop(inputs);
    };

    let snapshot_height = ((f64::from(args.snapshot_width) * script.frame_height / script.frame_width).round()
        as u32)
        .max(1);

    let consume = async move {
        let mut shown_alert = None;
        let mut index = 0usize;
        while let Some(report) = reports.recv().await {
            let report: FaceReport = report.context("face session")?;
            info!(
                t_ms = start.elapsed().as_millis() as u64,
                color = ?report.zone_color,
                status = %report.status_text,
                "face"
            );

            if let Some(dir) = &args.snapshots {
                let canvas = overlay::render(&report, &zone, dwell_seconds, args.snapshot_width, snapshot_height);
                let path = dir.join(format!("face_{index:05}.png"));
                overlay::save(&canvas, &path).with_context(|| format!("writing {}", path.display()))?;
                index += 1;
            }

            if report.alert_id != shown_alert {
                if let Some(alert) = &report.alert {
                    info!(title = alert.title(), message = %alert.message(), "alert");
                    if args.auto_ack {
                        if let Some(sender) = ack.upgrade() {
                            let _ = sender.send(FaceInput::AcknowledgeAlert).await;
                        }
                    }
                }
                shown_alert = report.alert_id;
            }
        }
        anyhow::Ok(())
    };

    let ((), consumed) = futures::join!(feed, consume);
    consumed?;
    let session = handle.task.await.context("face session task panicked")?;
    info!(final_state = ?session.detector().state(), "face session closed");
    Ok(())
}

async fn replay_voice(script: &VoiceScript, config: &AppConfig, args: &Args, start: Instant) -> Result<()> {
    let session = VoiceTestSession::from_config(&config.sound).context("building voice session")?;
    let handle = spawn_session(session, DEFAULT_INPUT_CAPACITY);
    let inputs = handle.inputs;
    let mut reports = handle.reports;
    let ack: mpsc::WeakSender<VoiceInput> = inputs.downgrade();

    let feed = async move {
        let mut events: Vec<(u64, VoiceInput)> = vec![(script.start_at_ms, VoiceInput::Start(script.permission.into()))];
        events.extend(script.samples.iter().map(|s| (s.at_ms, VoiceInput::Sample(s.level))));
        events.extend(
            script
                .failures
                .iter()
                .map(|f| (f.at_ms, VoiceInput::Failure(f.message.clone()))),
        );
        events.extend(script.stop_at_ms.map(|at_ms| (at_ms, VoiceInput::Stop)));
        // Stable sort keeps the start ahead of samples sharing its timestamp.
        events.sort_by_key(|(at_ms, _)| *at_ms);

        for (at_ms, input) in events {
            tokio::time::sleep_until(at(start, at_ms)).await;
            if inputs.send(input).await.is_err() {
                break;
            }
        }
        tokio::time::sleep_until(at(start, script.end_at_ms())).await;
        drop(inputs);
    };

    let consume = async move {
        let mut shown_alert = None;
        while let Some(report) = reports.recv().await {
            let report: VoiceReport = match report {
                Ok(report) => report,
                Err(Error::PermissionDenied(device)) => {
                    warn!("Permission Denied: {device} permission is required for voice detection.");
                    continue;
                }
                Err(err) => return Err(err).context("voice session"),
            };
            info!(
                t_ms = start.elapsed().as_millis() as u64,
                circles = report.visible_circles,
                level = ?report.state.last_level,
                recorder = ?report.recorder,
                status = %report.status_text,
                "voice"
            );

            if report.alert_id != shown_alert {
                if let Some(alert) = &report.alert {
                    info!(title = alert.title(), message = %alert.message(), "alert");
                    if args.auto_ack {
                        if let Some(sender) = ack.upgrade() {
                            let _ = sender.send(VoiceInput::AcknowledgeAlert).await;
                        }
                    }
                }
                shown_alert = report.alert_id;
            }
        }
        anyhow::Ok(())
    };

    let ((), consumed) = futures::join!(feed, consume);
    consumed?;
    let session = handle.task.await.context("voice session task panicked")?;
    info!(final_state = ?session.tracker().state(), "voice session closed");
    Ok(())
}
