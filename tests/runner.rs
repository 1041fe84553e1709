use dwell_sense::config::{DwellConfig, SoundConfig};
use dwell_sense::core_modules::bounding_box::BoundingBox;
use dwell_sense::pipeline::{
    Alert, FaceDwellSession, Permission, RecorderCommand, VoiceReport, VoiceTestSession,
};
use dwell_sense::runner::{DEFAULT_INPUT_CAPACITY, FaceInput, VoiceInput, spawn_session};
use dwell_sense::{Device, Error};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

fn inside_frame() -> FaceInput {
    FaceInput::Frame {
        faces: vec![BoundingBox::new(340.0, 560.0, 400.0, 400.0)],
        frame_width: 1080.0,
        frame_height: 1920.0,
    }
}

async fn next_voice_report(
    reports: &mut UnboundedReceiver<dwell_sense::Result<VoiceReport>>,
    mut matches: impl FnMut(&VoiceReport) -> bool,
) -> VoiceReport {
    loop {
        let report = reports.recv().await.unwrap().unwrap();
        if matches(&report) {
            return report;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn face_session_confirms_after_dwell_and_rearms_on_acknowledge() {
    let session = FaceDwellSession::open(Permission::Granted, &DwellConfig::default()).unwrap();
    let mut handle = spawn_session(session, DEFAULT_INPUT_CAPACITY);

    handle.inputs.send(inside_frame()).await.unwrap();
    let first = handle.reports.recv().await.unwrap().unwrap();
    assert_eq!(first.state.seconds_remaining, 5);

    let started = tokio::time::Instant::now();
    let mut last = first;
    while !last.state.confirmed {
        last = handle.reports.recv().await.unwrap().unwrap();
    }
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(5) && elapsed < Duration::from_secs(6), "{elapsed:?}");
    assert_eq!(last.alert, Some(Alert::DwellConfirmed { dwell_seconds: 5 }));

    handle.inputs.send(FaceInput::AcknowledgeAlert).await.unwrap();
    let acked = handle.reports.recv().await.unwrap().unwrap();
    assert!(!acked.state.confirmed);
    assert_eq!(acked.alert, None);

    drop(handle.inputs);
    let session = handle.task.await.unwrap();
    assert!(!session.detector().state().timer_active);
}

#[tokio::test(start_paused = true)]
async fn face_session_drops_countdown_when_face_leaves() {
    let session = FaceDwellSession::open(Permission::Granted, &DwellConfig::default()).unwrap();
    let mut handle = spawn_session(session, DEFAULT_INPUT_CAPACITY);

    handle.inputs.send(inside_frame()).await.unwrap();
    handle.reports.recv().await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(2_500)).await;

    handle
        .inputs
        .send(FaceInput::Frame {
            faces: Vec::new(),
            frame_width: 1080.0,
            frame_height: 1920.0,
        })
        .await
        .unwrap();

    let mut last = None;
    while let Ok(Some(report)) =
        tokio::time::timeout(Duration::from_secs(10), handle.reports.recv()).await
    {
        last = Some(report.unwrap());
    }
    let last = last.unwrap();
    assert!(!last.state.timer_active);
    assert!(!last.state.confirmed);
    assert_eq!(last.state.seconds_remaining, 5);
}

#[tokio::test(start_paused = true)]
async fn denied_microphone_is_reported() {
    let session = VoiceTestSession::from_config(&SoundConfig::default()).unwrap();
    let mut handle = spawn_session(session, DEFAULT_INPUT_CAPACITY);

    handle
        .inputs
        .send(VoiceInput::Start(Permission::Denied))
        .await
        .unwrap();
    let err = handle.reports.recv().await.unwrap().unwrap_err();
    assert!(matches!(err, Error::PermissionDenied(Device::Microphone)));
}

#[tokio::test(start_paused = true)]
async fn voice_session_extends_on_sustained_quiet() {
    let session = VoiceTestSession::from_config(&SoundConfig::default()).unwrap();
    let mut handle = spawn_session(session, DEFAULT_INPUT_CAPACITY);

    handle
        .inputs
        .send(VoiceInput::Start(Permission::Granted))
        .await
        .unwrap();
    let started = handle.reports.recv().await.unwrap().unwrap();
    assert!(started.state.running);

    let recorder = next_voice_report(&mut handle.reports, |r| r.recorder.is_some()).await;
    assert_eq!(recorder.recorder, Some(RecorderCommand::Start));

    handle.inputs.send(VoiceInput::Sample(-40.0)).await.unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;
    handle.inputs.send(VoiceInput::Sample(-40.0)).await.unwrap();

    let extended = next_voice_report(&mut handle.reports, |r| r.alert.is_some()).await;
    assert_eq!(extended.alert, Some(Alert::LowSoundExtended { session_seconds: 30 }));
    assert_eq!(extended.state.seconds_remaining, 30);
    assert_eq!(extended.visible_circles, 1);

    handle.inputs.send(VoiceInput::Stop).await.unwrap();
    let stopped = next_voice_report(&mut handle.reports, |r| !r.state.running).await;
    assert_eq!(stopped.recorder, Some(RecorderCommand::Stop));

    let quiet = tokio::time::timeout(Duration::from_secs(5), handle.reports.recv()).await;
    assert!(quiet.is_err(), "stopped session kept reporting");
}

#[tokio::test(start_paused = true)]
async fn face_reset_mid_countdown_cancels_timer() {
    let session = FaceDwellSession::open(Permission::Granted, &DwellConfig::default()).unwrap();
    let mut handle = spawn_session(session, DEFAULT_INPUT_CAPACITY);

    handle.inputs.send(inside_frame()).await.unwrap();
    handle.reports.recv().await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    while let Ok(report) = handle.reports.try_recv() {
        assert!(report.unwrap().state.timer_active);
    }

    handle.inputs.send(FaceInput::Reset).await.unwrap();
    let reset = handle.reports.recv().await.unwrap().unwrap();
    assert!(!reset.state.timer_active);
    assert!(!reset.state.inside_zone);
    assert_eq!(reset.state.seconds_remaining, 5);

    let quiet = tokio::time::timeout(Duration::from_secs(10), handle.reports.recv()).await;
    assert!(quiet.is_err(), "countdown kept ticking after reset");

    drop(handle.inputs);
    let session = handle.task.await.unwrap();
    assert!(!session.detector().state().confirmed);
}
