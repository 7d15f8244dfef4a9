//! BeatGridBuilder - regular beat/bar lattice from raw beat-tracker output
//!
//! The beat tracker (an external collaborator) reports a tempo and a list of
//! detected beat times. This module turns them into a strictly regular grid
//! and scores how trustworthy the tracking looks:
//!
//! - consistency = max(0, 1 - std(intervals) / mean(intervals))
//! - accuracy    = max(0, 1 - mean(|interval - 60/tempo|) / (60/tempo))
//! - confidence  = clamp(0.7 × consistency + 0.3 × accuracy, 0, 1)
//!
//! Bars assume a fixed 4/4 signature.

use serde::{Deserialize, Serialize};

use crate::error::{validate_timeline, InputError};

/// Beats per bar (fixed 4/4)
pub const BEATS_PER_BAR: usize = 4;

/// Fewer raw beats than this give zero confidence
pub const MIN_BEATS_FOR_CONFIDENCE: usize = 4;

const CONSISTENCY_WEIGHT: f64 = 0.7;
const ACCURACY_WEIGHT: f64 = 0.3;

/// Raw beat-tracker output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatTrack {
    /// Estimated tempo in BPM
    pub tempo: f64,
    /// Detected beat times in seconds, ascending
    pub beat_times: Vec<f64>,
}

/// Regular beat and bar lattice with a tracking confidence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeatGrid {
    beat_times: Vec<f64>,
    bar_times: Vec<f64>,
    beat_interval: f64,
    tempo: f64,
    confidence: f64,
}

impl BeatGrid {
    /// Build a grid from regular beat times.
    ///
    /// Bar times start at the first beat and step by four beat intervals.
    /// Confidence is clamped to `[0, 1]`; NaN counts as zero.
    pub fn new(beat_times: Vec<f64>, tempo: f64, confidence: f64) -> Result<Self, InputError> {
        validate_tempo(tempo)?;
        validate_timeline("beat_times", &beat_times)?;

        let beat_interval = 60.0 / tempo;
        let bar_times = match (beat_times.first(), beat_times.last()) {
            (Some(&first), Some(&last)) => {
                arithmetic_grid(first, last, beat_interval * BEATS_PER_BAR as f64)
            }
            _ => Vec::new(),
        };
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };

        Ok(Self {
            beat_times,
            bar_times,
            beat_interval,
            tempo,
            confidence,
        })
    }

    pub fn beat_times(&self) -> &[f64] {
        &self.beat_times
    }

    pub fn bar_times(&self) -> &[f64] {
        &self.bar_times
    }

    /// Seconds per beat
    pub fn beat_interval(&self) -> f64 {
        self.beat_interval
    }

    /// Seconds per bar (four beats)
    pub fn bar_duration(&self) -> f64 {
        self.beat_interval * BEATS_PER_BAR as f64
    }

    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn is_empty(&self) -> bool {
        self.beat_times.is_empty()
    }
}

/// Stateless builder turning raw beats into a [`BeatGrid`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BeatGridBuilder;

impl BeatGridBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build a regular grid spanning the first to last raw beat.
    ///
    /// # Returns
    /// * `Ok(grid)` - empty grid with zero confidence when no beats were found
    /// * `Err(InputError)` - tempo not a positive BPM, or malformed beat times
    pub fn build(&self, raw_beat_times: &[f64], tempo: f64) -> Result<BeatGrid, InputError> {
        validate_tempo(tempo)?;
        validate_timeline("beat_times", raw_beat_times)?;

        let confidence = beat_confidence(raw_beat_times, tempo);
        let beat_times = match (raw_beat_times.first(), raw_beat_times.last()) {
            (Some(&first), Some(&last)) => arithmetic_grid(first, last, 60.0 / tempo),
            _ => Vec::new(),
        };

        tracing::info!(
            "[BeatGridBuilder] tempo={:.2} BPM, raw beats={}, grid beats={}, confidence={:.3}",
            tempo,
            raw_beat_times.len(),
            beat_times.len(),
            confidence
        );

        BeatGrid::new(beat_times, tempo, confidence)
    }

    pub fn build_from_track(&self, track: &BeatTrack) -> Result<BeatGrid, InputError> {
        self.build(&track.beat_times, track.tempo)
    }
}

/// Tracking confidence from inter-beat interval statistics.
///
/// Rewards low jitter first, then closeness to the declared tempo. Fewer
/// than four beats give zero.
pub fn beat_confidence(beat_times: &[f64], tempo: f64) -> f64 {
    if beat_times.len() < MIN_BEATS_FOR_CONFIDENCE || !(tempo > 0.0) {
        return 0.0;
    }

    let intervals: Vec<f64> = beat_times.windows(2).map(|w| w[1] - w[0]).collect();
    let n = intervals.len() as f64;
    let expected = 60.0 / tempo;

    let mean = intervals.iter().sum::<f64>() / n;
    let consistency = if mean > 0.0 {
        let variance = intervals.iter().map(|i| (i - mean).powi(2)).sum::<f64>() / n;
        (1.0 - variance.sqrt() / mean).max(0.0)
    } else {
        0.0
    };

    let mean_abs_error = intervals.iter().map(|i| (i - expected).abs()).sum::<f64>() / n;
    let accuracy = (1.0 - mean_abs_error / expected).max(0.0);

    (CONSISTENCY_WEIGHT * consistency + ACCURACY_WEIGHT * accuracy).clamp(0.0, 1.0)
}

fn validate_tempo(tempo: f64) -> Result<(), InputError> {
    if tempo.is_finite() && tempo > 0.0 {
        Ok(())
    } else {
        Err(InputError::InvalidTempo { tempo })
    }
}

/// `start, start + step, ...` up to and including `end` (within 1e-9 steps).
fn arithmetic_grid(start: f64, end: f64, step: f64) -> Vec<f64> {
    if end < start || !(step > 0.0) {
        return vec![start];
    }
    let count = ((end - start) / step + 1e-9).floor() as usize + 1;
    (0..count).map(|k| start + k as f64 * step).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regular_beats(start: f64, interval: f64, count: usize) -> Vec<f64> {
        (0..count).map(|i| start + i as f64 * interval).collect()
    }

    #[test]
    fn test_perfect_tracking_full_confidence() {
        let beats = regular_beats(0.5, 0.5, 16);
        let confidence = beat_confidence(&beats, 120.0);
        assert!((confidence - 1.0).abs() < 1e-9, "got {}", confidence);
    }

    #[test]
    fn test_wrong_tempo_scores_moderately() {
        // Steady beats at 0.5 s but tempo declared as 100 BPM (0.6 s).
        let beats = regular_beats(0.0, 0.5, 16);
        let confidence = beat_confidence(&beats, 100.0);
        // consistency 1.0, accuracy 1 - 0.1/0.6
        let expected = 0.7 + 0.3 * (1.0 - 0.1 / 0.6);
        assert!((confidence - expected).abs() < 1e-9, "got {}", confidence);
    }

    #[test]
    fn test_jittery_beats_lower_confidence() {
        let beats = vec![0.0, 0.3, 1.0, 1.2, 2.0, 2.4, 3.0];
        let steady = beat_confidence(&regular_beats(0.0, 0.5, 7), 120.0);
        let jittery = beat_confidence(&beats, 120.0);
        assert!(jittery < steady);
        assert!((0.0..=1.0).contains(&jittery));
    }

    #[test]
    fn test_too_few_beats_zero_confidence() {
        assert_eq!(beat_confidence(&[0.0, 0.5, 1.0], 120.0), 0.0);
        let grid = BeatGridBuilder::new().build(&[0.0, 0.5, 1.0], 120.0).unwrap();
        assert_eq!(grid.confidence(), 0.0);
        assert_eq!(grid.beat_times(), &[0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_grid_is_regular_between_first_and_last_beat() {
        // Raw beats jitter around 0.5 s; grid is strictly regular.
        let raw = vec![1.0, 1.52, 1.98, 2.51, 3.0];
        let grid = BeatGridBuilder::new().build(&raw, 120.0).unwrap();
        assert_eq!(grid.beat_interval(), 0.5);
        assert_eq!(grid.beat_times(), &[1.0, 1.5, 2.0, 2.5, 3.0]);
        assert_eq!(grid.bar_times(), &[1.0, 3.0]);
        assert_eq!(grid.bar_duration(), 2.0);
        assert_eq!(grid.tempo(), 120.0);
    }

    #[test]
    fn test_bar_times_step_four_beats() {
        let raw = regular_beats(0.0, 0.5, 20);
        let grid = BeatGridBuilder::new().build(&raw, 120.0).unwrap();
        assert_eq!(grid.bar_times(), &[0.0, 2.0, 4.0, 6.0, 8.0]);
    }

    #[test]
    fn test_empty_beats_empty_grid() {
        let grid = BeatGridBuilder::new().build(&[], 120.0).unwrap();
        assert!(grid.is_empty());
        assert!(grid.bar_times().is_empty());
        assert_eq!(grid.confidence(), 0.0);
    }

    #[test]
    fn test_invalid_tempo_rejected() {
        let builder = BeatGridBuilder::new();
        assert!(matches!(
            builder.build(&[0.0, 0.5], 0.0),
            Err(InputError::InvalidTempo { .. })
        ));
        assert!(builder.build(&[0.0, 0.5], f64::NAN).is_err());
        assert!(builder.build(&[0.0, 0.5], -120.0).is_err());
    }

    #[test]
    fn test_unordered_beats_rejected() {
        let err = BeatGridBuilder::new()
            .build(&[0.0, 1.0, 0.5], 120.0)
            .unwrap_err();
        assert!(matches!(
            err,
            InputError::NonMonotonicTimes {
                field: "beat_times",
                ..
            }
        ));
    }

    #[test]
    fn test_build_from_track() {
        let track: BeatTrack =
            serde_json::from_str(r#"{"tempo": 60.0, "beat_times": [0.0, 1.0, 2.0, 3.0]}"#).unwrap();
        let grid = BeatGridBuilder::new().build_from_track(&track).unwrap();
        assert_eq!(grid.beat_interval(), 1.0);
        assert!((grid.confidence() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_clamped_on_manual_grid() {
        let grid = BeatGrid::new(vec![0.0, 0.5], 120.0, 1.7).unwrap();
        assert_eq!(grid.confidence(), 1.0);
        let grid = BeatGrid::new(vec![0.0, 0.5], 120.0, f64::NAN).unwrap();
        assert_eq!(grid.confidence(), 0.0);
    }
}
