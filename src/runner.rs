// THEORY:
// A session is a single-threaded state holder: inputs for it must be applied one at a
// time and in arrival order. The runner enforces that by giving each session its own
// tokio task. Sampler callbacks push inputs into a bounded channel, the task's
// scheduler pushes timer firings into another, and one `select!` loop applies both to
// the session and forwards every resulting report. Nothing else ever touches the
// session, so it needs no locking.
//
// Shutdown is driven by the producers: when every input sender is dropped the loop
// ends, the session cancels its timers, and the task hands the session back.

use crate::core_modules::bounding_box::BoundingBox;
use crate::error::Result;
use crate::pipeline::{FaceDwellSession, FaceReport, Permission, VoiceReport, VoiceTestSession};
use crate::scheduler::{Scheduler, TimerFired, TokioScheduler};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

pub const DEFAULT_INPUT_CAPACITY: usize = 64;

/// A session that can be driven by `run_session`.
pub trait ReactiveSession {
    type Input: Send + 'static;
    type Report: Send + 'static;

    /// Applies one input. `Ok(None)` means the input produced nothing to show.
    fn on_input(
        &mut self,
        input: Self::Input,
        now: Instant,
        scheduler: &mut dyn Scheduler,
    ) -> Result<Option<Self::Report>>;

    fn on_timer(&mut self, fired: TimerFired, scheduler: &mut dyn Scheduler) -> Option<Self::Report>;

    fn shutdown(&mut self, scheduler: &mut dyn Scheduler);
}

#[derive(Debug, Clone)]
pub enum FaceInput {
    Frame {
        faces: Vec<BoundingBox>,
        frame_width: f64,
        frame_height: f64,
    },
    AcknowledgeAlert,
    Failure(String),
    Reset,
}

impl ReactiveSession for FaceDwellSession {
    type Input = FaceInput;
    type Report = FaceReport;

    fn on_input(
        &mut self,
        input: FaceInput,
        _now: Instant,
        scheduler: &mut dyn Scheduler,
    ) -> Result<Option<FaceReport>> {
        let report = match input {
            FaceInput::Frame {
                faces,
                frame_width,
                frame_height,
            } => self.on_frame(&faces, frame_width, frame_height, scheduler),
            FaceInput::AcknowledgeAlert => self.acknowledge_alert(scheduler),
            FaceInput::Failure(message) => self.report_failure(message),
            FaceInput::Reset => self.reset(scheduler),
        };
        Ok(Some(report))
    }

    fn on_timer(&mut self, fired: TimerFired, scheduler: &mut dyn Scheduler) -> Option<FaceReport> {
        FaceDwellSession::on_timer(self, fired, scheduler)
    }

    fn shutdown(&mut self, scheduler: &mut dyn Scheduler) {
        FaceDwellSession::shutdown(self, scheduler);
    }
}

#[derive(Debug, Clone)]
pub enum VoiceInput {
    Start(Permission),
    Sample(f64),
    Stop,
    AcknowledgeAlert,
    Failure(String),
}

impl ReactiveSession for VoiceTestSession {
    type Input = VoiceInput;
    type Report = VoiceReport;

    fn on_input(
        &mut self,
        input: VoiceInput,
        now: Instant,
        scheduler: &mut dyn Scheduler,
    ) -> Result<Option<VoiceReport>> {
        let report = match input {
            VoiceInput::Start(permission) => self.start(permission, scheduler)?,
            VoiceInput::Sample(level) => self.on_sample(level, now, scheduler),
            VoiceInput::Stop => self.stop(scheduler),
            VoiceInput::AcknowledgeAlert => self.acknowledge_alert(scheduler),
            VoiceInput::Failure(message) => self.report_failure(message),
        };
        Ok(Some(report))
    }

    fn on_timer(&mut self, fired: TimerFired, scheduler: &mut dyn Scheduler) -> Option<VoiceReport> {
        VoiceTestSession::on_timer(self, fired, scheduler)
    }

    fn shutdown(&mut self, scheduler: &mut dyn Scheduler) {
        self.stop(scheduler);
    }
}

/// Drives `session` until every input sender is dropped or the report receiver goes away.
/// Returns the session so its final state can be inspected.
pub async fn run_session<S: ReactiveSession>(
    mut session: S,
    mut inputs: mpsc::Receiver<S::Input>,
    reports: mpsc::UnboundedSender<Result<S::Report>>,
) -> S {
    let (mut scheduler, mut fired_rx) = TokioScheduler::new();

    loop {
        let outcome = tokio::select! {
            biased;
            input = inputs.recv() => {
                let Some(input) = input else { break };
                let now = tokio::time::Instant::now().into_std();
                session.on_input(input, now, &mut scheduler).transpose()
            }
            Some(fired) = fired_rx.recv() => session.on_timer(fired, &mut scheduler).map(Ok),
        };

        if let Some(outcome) = outcome {
            if reports.send(outcome).is_err() {
                debug!("report receiver dropped, stopping session");
                break;
            }
        }
    }

    session.shutdown(&mut scheduler);
    scheduler.cancel_all();
    debug!("session runner finished");
    session
}

/// The producer and consumer ends of a spawned session.
pub struct SessionHandle<S: ReactiveSession> {
    pub inputs: mpsc::Sender<S::Input>,
    pub reports: mpsc::UnboundedReceiver<Result<S::Report>>,
    pub task: JoinHandle<S>,
}

/// Spawns `run_session` on the current tokio runtime.
pub fn spawn_session<S>(session: S, input_capacity: usize) -> SessionHandle<S>
where
    S: ReactiveSession + Send + 'static,
{
    let (inputs, input_rx) = mpsc::channel(input_capacity);
    let (report_tx, reports) = mpsc::unbounded_channel();
    let task = tokio::spawn(run_session(session, input_rx, report_tx));
    SessionHandle {
        inputs,
        reports,
        task,
    }
}
