pub mod band_tracker;
pub mod bounding_box;
pub mod dwell_detector;
pub mod sound_band;
pub mod zone;
