// THEORY:
// This file is the main entry point for the `dwell_sense` library crate.
// It exposes two independent reactive state machines and the thin layers
// that drive them from real capture streams:
//
// - `core_modules` holds the pure decision logic: the zone geometry, the
//   `DwellZoneDetector` fed by per-frame face boxes, and the `SoundBandTracker`
//   fed by metering samples. Nothing in there knows about clocks or tasks;
//   every operation takes its input (and the current time where it matters)
//   and returns a fresh snapshot.
// - `scheduler` is the seam for one-shot and repeating timers. Firings come
//   back as plain values so a cancelled timer can never touch a stopped session.
// - `pipeline` is the screen-controller layer: it owns a tracker plus its timers
//   and turns snapshots into presentation reports and user-facing alerts.
// - `runner` serializes inputs and timer firings for one session on a tokio task.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod pipeline;
pub mod runner;
pub mod scheduler;

pub use error::{Device, Error, Result};
