use dwell_sense::core_modules::band_tracker::{BandEvent, SoundBandTracker};
use dwell_sense::core_modules::bounding_box::BoundingBox;
use dwell_sense::core_modules::dwell_detector::{DwellEvent, DwellZoneDetector};
use dwell_sense::core_modules::sound_band::{Band, BandBoundaries};
use dwell_sense::core_modules::zone::Zone;
use std::time::{Duration, Instant};

const FRAME_W: f64 = 720.0;
const FRAME_H: f64 = 1280.0;
const QUIET_DB: f64 = -40.0;
const SILENT_DB: f64 = 5.0; // Above every band.

fn default_tracker() -> SoundBandTracker {
    SoundBandTracker::configure(BandBoundaries::default(), 30, Duration::from_secs(3)).unwrap()
}

fn inside_face() -> BoundingBox {
    BoundingBox::new(260.0, 400.0, 200.0, 260.0)
}

#[test]
fn full_frame_face_in_full_frame_zone_is_inside_on_first_frame() {
    let mut detector = DwellZoneDetector::with_defaults(Zone::full_frame()).unwrap();
    let face = BoundingBox::new(0.0, 0.0, FRAME_W, FRAME_H);

    assert_eq!(detector.overlap(&face, FRAME_W, FRAME_H), 1.0);
    let (state, event) = detector.on_frame(&[face], FRAME_W, FRAME_H);
    assert!(state.inside_zone);
    assert_eq!(event, Some(DwellEvent::CountdownStarted));
}

#[test]
fn dropout_restarts_dwell_countdown() {
    let mut detector = DwellZoneDetector::with_defaults(Zone::default()).unwrap();

    detector.on_frame(&[inside_face()], FRAME_W, FRAME_H);
    for _ in 0..4 {
        detector.on_frame(&[inside_face()], FRAME_W, FRAME_H);
        detector.on_tick();
    }
    assert_eq!(detector.state().seconds_remaining, 1);

    let (state, _) = detector.on_frame(&[], FRAME_W, FRAME_H);
    assert!(!state.confirmed);
    assert_eq!(state.seconds_remaining, 5);
    // A tick arriving after the drop-out must not count.
    assert_eq!(detector.on_tick().1, None);

    detector.on_frame(&[inside_face()], FRAME_W, FRAME_H);
    for second in 1..=5 {
        detector.on_frame(&[inside_face()], FRAME_W, FRAME_H);
        let (state, event) = detector.on_tick();
        if second < 5 {
            assert!(!state.confirmed, "confirmed early at {second}s");
            assert_eq!(event, None);
        } else {
            assert!(state.confirmed);
            assert_eq!(event, Some(DwellEvent::Confirmed));
        }
    }
}

#[test]
fn reset_always_returns_initial_snapshot() {
    let mut detector = DwellZoneDetector::configure(Zone::default(), 0.5, 7).unwrap();
    let script: [&[BoundingBox]; 4] = [&[inside_face()], &[], &[inside_face()], &[inside_face()]];

    for frames in 0..script.len() {
        for faces in &script[..frames] {
            detector.on_frame(faces, FRAME_W, FRAME_H);
            detector.on_tick();
        }
        let state = detector.reset();
        assert!(!state.inside_zone);
        assert!(!state.timer_active);
        assert!(!state.confirmed);
        assert_eq!(state.seconds_remaining, 7);
    }
}

#[test]
fn sustained_quiet_fires_once_and_restores_session_clock() {
    let mut tracker = default_tracker();
    tracker.start();
    for _ in 0..12 {
        tracker.on_tick();
    }
    assert_eq!(tracker.state().seconds_remaining, 18);

    let base = Instant::now();
    let mut fired_at = Vec::new();
    for step in 0..=35 {
        let now = base + Duration::from_millis(step * 100);
        let (state, event) = tracker.on_sample(QUIET_DB, now);
        assert_eq!(state.current_band, Band::QUIET);
        if event == Some(BandEvent::LowSignalSustained) {
            fired_at.push(step * 100);
            assert_eq!(state.seconds_remaining, 30);
        }
    }
    assert_eq!(fired_at, vec![3_000]);
}

#[test]
fn oscillating_quiet_never_sustains() {
    let mut tracker = default_tracker();
    tracker.start();
    let base = Instant::now();

    for step in 0..100u64 {
        let elapsed_ms = step * 100;
        let level = if (elapsed_ms / 1_000) % 2 == 0 {
            SILENT_DB
        } else {
            QUIET_DB
        };
        let (state, event) = tracker.on_sample(level, base + Duration::from_millis(elapsed_ms));
        assert_eq!(event, None, "alert fired at {elapsed_ms}ms");
        assert!(!state.low_alert_shown);
    }
}

#[test]
fn classification_is_total() {
    let bands = BandBoundaries::default();
    let mut level = -400.0;
    while level <= 100.0 {
        let band = bands.classify(level);
        assert!(band.index() <= 3);
        level += 0.25;
    }
    for special in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, -0.0] {
        assert!(bands.classify(special).index() <= 3);
    }
}
