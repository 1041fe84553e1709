// THEORY:
// Metering samples arrive as decibel-like levels, roughly -160 (silence) to 0 (full
// scale). The voice screen does not care about the exact value, only about which of
// three loudness bands it falls in: quiet, medium or loud. Anything that falls in
// none of them (above 0, inside a gap between bands, or not a number) is band 0.
//
// Classification is a total function: every `f64` maps to exactly one band.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Discrete loudness bucket, `0` (unclassified) to `3` (loud).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Band(u8);

impl Band {
    pub const NONE: Band = Band(0);
    pub const QUIET: Band = Band(1);
    pub const MEDIUM: Band = Band(2);
    pub const LOUD: Band = Band(3);

    pub fn index(self) -> u8 {
        self.0
    }
}

/// Inclusive level range for one band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandRange {
    pub min: f64,
    pub max: f64,
}

impl BandRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, level: f64) -> bool {
        level >= self.min && level <= self.max
    }
}

/// Ranges for bands 1..=3, ascending and non-overlapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[BandRange; 3]", into = "[BandRange; 3]")]
pub struct BandBoundaries {
    ranges: [BandRange; 3],
}

impl BandBoundaries {
    pub fn new(ranges: [BandRange; 3]) -> Result<Self> {
        for (i, range) in ranges.iter().enumerate() {
            if !range.min.is_finite() || !range.max.is_finite() {
                return Err(Error::invalid(format!("band {} bounds must be finite", i + 1)));
            }
            if range.min > range.max {
                return Err(Error::invalid(format!(
                    "band {} has min {} above max {}",
                    i + 1,
                    range.min,
                    range.max
                )));
            }
        }
        for (i, pair) in ranges.windows(2).enumerate() {
            if pair[1].min <= pair[0].max {
                return Err(Error::invalid(format!(
                    "band {} overlaps or precedes band {}",
                    i + 2,
                    i + 1
                )));
            }
        }
        Ok(Self { ranges })
    }

    pub fn classify(&self, level: f64) -> Band {
        self.ranges
            .iter()
            .position(|range| range.contains(level))
            .map(|i| Band(i as u8 + 1))
            .unwrap_or(Band::NONE)
    }
}

impl Default for BandBoundaries {
    fn default() -> Self {
        Self {
            ranges: [
                BandRange::new(-160.0, -26.0),
                BandRange::new(-25.0, -17.0),
                BandRange::new(-16.0, 0.0),
            ],
        }
    }
}

impl TryFrom<[BandRange; 3]> for BandBoundaries {
    type Error = Error;

    fn try_from(ranges: [BandRange; 3]) -> Result<Self> {
        Self::new(ranges)
    }
}

impl From<BandBoundaries> for [BandRange; 3] {
    fn from(boundaries: BandBoundaries) -> Self {
        boundaries.ranges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bands_follow_meter_ranges() {
        let b = BandBoundaries::default();
        assert_eq!(b.classify(-160.0), Band::QUIET);
        assert_eq!(b.classify(-40.0), Band::QUIET);
        assert_eq!(b.classify(-26.0), Band::QUIET);
        assert_eq!(b.classify(-20.0), Band::MEDIUM);
        assert_eq!(b.classify(-17.0), Band::MEDIUM);
        assert_eq!(b.classify(-16.0), Band::LOUD);
        assert_eq!(b.classify(0.0), Band::LOUD);
    }

    #[test]
    fn gaps_and_outliers_fall_in_band_zero() {
        let b = BandBoundaries::default();
        assert_eq!(b.classify(-25.5), Band::NONE);
        assert_eq!(b.classify(-16.5), Band::NONE);
        assert_eq!(b.classify(3.0), Band::NONE);
        assert_eq!(b.classify(-200.0), Band::NONE);
        assert_eq!(b.classify(f64::NAN), Band::NONE);
        assert_eq!(b.classify(f64::INFINITY), Band::NONE);
    }

    #[test]
    fn rejects_overlapping_bands() {
        let ranges = [
            BandRange::new(-160.0, -20.0),
            BandRange::new(-25.0, -17.0),
            BandRange::new(-16.0, 0.0),
        ];
        assert!(matches!(BandBoundaries::new(ranges), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn rejects_unordered_bands() {
        let ranges = [
            BandRange::new(-16.0, 0.0),
            BandRange::new(-25.0, -17.0),
            BandRange::new(-160.0, -26.0),
        ];
        assert!(BandBoundaries::new(ranges).is_err());

        let inverted = [
            BandRange::new(-26.0, -160.0),
            BandRange::new(-25.0, -17.0),
            BandRange::new(-16.0, 0.0),
        ];
        assert!(BandBoundaries::new(inverted).is_err());
    }
}
