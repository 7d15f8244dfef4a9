//! BeatQuantizer - snaps clip boundaries onto the beat/bar grid
//!
//! A clip's start moves back to the latest grid beat at or before it, and
//! its duration becomes a whole number of bars close to the original. The
//! snap is refused when the grid is untrustworthy or when the result strays
//! too far from the original timing:
//!
//! | Outcome                  | Condition                                              |
//! |--------------------------|--------------------------------------------------------|
//! | `low_confidence`         | grid confidence below `min_confidence`                 |
//! | `no_beat_grid`           | grid has no beats                                      |
//! | `unreasonable_quantization` | start moves forward or back by more than `max_start_shift`, duration ratio outside `[min, max]`, or the clip would end past the audio |
//! | aligned                  | otherwise                                              |
//!
//! Rejection is not an error: the result carries the original timing and a
//! reason tag.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::beat_grid::BeatGrid;
use super::round3;
use super::segments::Segment;
use crate::config::QuantizerConfig;

/// Why a quantization was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuantizeRejection {
    #[serde(rename = "low_confidence")]
    LowConfidence,
    #[serde(rename = "no_beat_grid")]
    NoBeatGrid,
    #[serde(rename = "unreasonable_quantization")]
    Unreasonable,
}

impl QuantizeRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuantizeRejection::LowConfidence => "low_confidence",
            QuantizeRejection::NoBeatGrid => "no_beat_grid",
            QuantizeRejection::Unreasonable => "unreasonable_quantization",
        }
    }
}

impl fmt::Display for QuantizeRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one quantization attempt.
///
/// When `aligned` is false, `start`/`duration` are the input values untouched
/// and `reason` says why.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuantizedTiming {
    pub start: f64,
    pub duration: f64,
    pub aligned: bool,
    pub reason: Option<QuantizeRejection>,
    pub original_start: Option<f64>,
    pub original_duration: Option<f64>,
    pub bar_count: Option<u32>,
}

impl QuantizedTiming {
    fn rejected(start: f64, duration: f64, reason: QuantizeRejection) -> Self {
        Self {
            start,
            duration,
            aligned: false,
            reason: Some(reason),
            original_start: None,
            original_duration: None,
            bar_count: None,
        }
    }
}

/// Applies the snap-or-reject policy with configurable thresholds.
#[derive(Debug, Clone, Copy, Default)]
pub struct BeatQuantizer {
    config: QuantizerConfig,
}

impl BeatQuantizer {
    pub fn new(config: QuantizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QuantizerConfig {
        &self.config
    }

    /// Quantize a segment's start and length against `grid`.
    ///
    /// With a known `audio_duration`, a snap whose end would fall past the
    /// audio is refused as unreasonable.
    pub fn quantize(
        &self,
        segment: &Segment,
        grid: &BeatGrid,
        audio_duration: Option<f64>,
    ) -> QuantizedTiming {
        let timing = self.quantize_timing(segment.start, segment.length, grid);
        match audio_duration {
            Some(limit) if timing.aligned && aligned_end(&timing) > limit => {
                tracing::warn!(
                    "[BeatQuantizer] Clip {} would end at {:.3}s past audio end {:.3}s, using original",
                    segment.id,
                    aligned_end(&timing),
                    limit
                );
                QuantizedTiming::rejected(
                    segment.start,
                    segment.length,
                    QuantizeRejection::Unreasonable,
                )
            }
            _ => timing,
        }
    }

    /// Quantize a raw `(start, duration)` pair against `grid`.
    pub fn quantize_timing(&self, start: f64, duration: f64, grid: &BeatGrid) -> QuantizedTiming {
        if grid.confidence() < self.config.min_confidence {
            tracing::debug!(
                "[BeatQuantizer] Low beat confidence ({:.3}), skipping quantization",
                grid.confidence()
            );
            return QuantizedTiming::rejected(start, duration, QuantizeRejection::LowConfidence);
        }

        let Some(quantized_start) = snap_start(grid.beat_times(), start) else {
            tracing::debug!("[BeatQuantizer] Empty beat grid, skipping quantization");
            return QuantizedTiming::rejected(start, duration, QuantizeRejection::NoBeatGrid);
        };

        let bar_duration = grid.bar_duration();
        let (bars, quantized_duration) = snap_duration(duration, bar_duration);

        let shift = start - quantized_start;
        let ratio = if duration > 0.0 {
            quantized_duration / duration
        } else {
            f64::INFINITY
        };

        if shift < 0.0
            || shift > self.config.max_start_shift
            || ratio < self.config.min_duration_ratio
            || ratio > self.config.max_duration_ratio
        {
            tracing::warn!(
                "[BeatQuantizer] Unreasonable quantization (start {:.3} -> {:.3}, duration {:.3} -> {:.3}), using original",
                start,
                quantized_start,
                duration,
                quantized_duration
            );
            return QuantizedTiming::rejected(start, duration, QuantizeRejection::Unreasonable);
        }

        tracing::debug!(
            "[BeatQuantizer] start {:.3} -> {:.3}, duration {:.3} -> {:.3} ({} bars)",
            start,
            quantized_start,
            duration,
            quantized_duration,
            bars
        );

        QuantizedTiming {
            start: quantized_start,
            duration: quantized_duration,
            aligned: true,
            reason: None,
            original_start: Some(start),
            original_duration: Some(duration),
            bar_count: Some((quantized_duration / bar_duration).round() as u32),
        }
    }
}

/// End of the clip as [`Segment::apply_alignment`] will round it.
fn aligned_end(timing: &QuantizedTiming) -> f64 {
    round3(round3(timing.start) + round3(timing.duration))
}

/// Latest grid time `<= start`, else the first grid time. `None` for an
/// empty grid.
fn snap_start(beat_times: &[f64], start: f64) -> Option<f64> {
    let first = *beat_times.first()?;
    let before = beat_times.partition_point(|&t| t <= start);
    if before == 0 {
        Some(first)
    } else {
        Some(beat_times[before - 1])
    }
}

/// Closest whole-bar duration from a length-dependent candidate set.
/// Ties go to the fewer bars.
fn snap_duration(duration: f64, bar_duration: f64) -> (u32, f64) {
    let candidates: [u32; 3] = if duration <= 4.0 * bar_duration {
        [2, 4, 6]
    } else if duration <= 8.0 * bar_duration {
        [4, 6, 8]
    } else {
        [8, 12, 16]
    };

    let mut best = (candidates[0], candidates[0] as f64 * bar_duration);
    for &bars in &candidates[1..] {
        let length = bars as f64 * bar_duration;
        if (length - duration).abs() < (best.1 - duration).abs() {
            best = (bars, length);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Peak, SegmentBuilder};

    /// 120 BPM grid: 0.5 s beats, 2 s bars
    fn grid(confidence: f64) -> BeatGrid {
        let beats = (0..240).map(|i| i as f64 * 0.5).collect();
        BeatGrid::new(beats, 120.0, confidence).unwrap()
    }

    fn quantizer() -> BeatQuantizer {
        BeatQuantizer::default()
    }

    #[test]
    fn test_snaps_back_and_to_bars() {
        let result = quantizer().quantize_timing(1.2, 2.0, &grid(0.8));
        assert!(result.aligned);
        assert_eq!(result.reason, None);
        assert_eq!(result.start, 1.0);
        // candidates {2,4,6} bars = {4,8,12} s; 4 s is closest, ratio 2.0 inclusive
        assert_eq!(result.duration, 4.0);
        assert_eq!(result.bar_count, Some(2));
        assert_eq!(result.original_start, Some(1.2));
        assert_eq!(result.original_duration, Some(2.0));
    }

    #[test]
    fn test_start_on_beat_is_kept() {
        let result = quantizer().quantize_timing(20.0, 16.0, &grid(0.9));
        assert!(result.aligned);
        assert_eq!(result.start, 20.0);
        // 16 s = 8 bars, medium set {4,6,8}
        assert_eq!(result.duration, 16.0);
        assert_eq!(result.bar_count, Some(8));
    }

    #[test]
    fn test_long_clip_uses_long_bar_set() {
        let result = quantizer().quantize_timing(30.3, 25.0, &grid(0.9));
        assert!(result.aligned);
        assert_eq!(result.start, 30.0);
        // long set {8,12,16} bars = {16,24,32} s
        assert_eq!(result.duration, 24.0);
        assert_eq!(result.bar_count, Some(12));
    }

    #[test]
    fn test_duration_tie_prefers_fewer_bars() {
        // 6 s sits between 4 s and 8 s in the short set.
        assert_eq!(snap_duration(6.0, 2.0), (2, 4.0));
        // 20 s is in the long set {16,24,32} s, equally far from 16 and 24.
        assert_eq!(snap_duration(20.0, 2.0), (8, 16.0));
    }

    #[test]
    fn test_low_confidence_is_bitwise_identity() {
        let start = 12.345_678_9;
        let duration = 17.000_000_1;
        let result = quantizer().quantize_timing(start, duration, &grid(0.299));
        assert!(!result.aligned);
        assert_eq!(result.reason, Some(QuantizeRejection::LowConfidence));
        assert_eq!(result.start.to_bits(), start.to_bits());
        assert_eq!(result.duration.to_bits(), duration.to_bits());
        assert_eq!(result.bar_count, None);
    }

    #[test]
    fn test_confidence_threshold_inclusive() {
        let result = quantizer().quantize_timing(1.2, 2.0, &grid(0.3));
        assert!(result.aligned);
    }

    #[test]
    fn test_empty_grid_rejected() {
        let empty = BeatGrid::new(Vec::new(), 120.0, 0.9).unwrap();
        let result = quantizer().quantize_timing(5.0, 15.0, &empty);
        assert!(!result.aligned);
        assert_eq!(result.reason, Some(QuantizeRejection::NoBeatGrid));
        assert_eq!(result.start, 5.0);
    }

    #[test]
    fn test_low_confidence_checked_before_empty_grid() {
        let empty = BeatGrid::new(Vec::new(), 120.0, 0.1).unwrap();
        let result = quantizer().quantize_timing(5.0, 15.0, &empty);
        assert_eq!(result.reason, Some(QuantizeRejection::LowConfidence));
    }

    #[test]
    fn test_start_before_grid_rejected_not_moved_forward() {
        let late = BeatGrid::new(vec![10.0, 10.5, 11.0, 11.5], 120.0, 0.9).unwrap();
        let result = quantizer().quantize_timing(4.0, 8.0, &late);
        assert!(!result.aligned);
        assert_eq!(result.reason, Some(QuantizeRejection::Unreasonable));
        assert_eq!(result.start, 4.0);
    }

    #[test]
    fn test_large_backward_shift_rejected() {
        // Last beat at 5.0, clip at 20.0: shift of 15 s.
        let short = BeatGrid::new(vec![3.5, 4.0, 4.5, 5.0], 120.0, 0.9).unwrap();
        let result = quantizer().quantize_timing(20.0, 16.0, &short);
        assert_eq!(result.reason, Some(QuantizeRejection::Unreasonable));

        // Exactly 10 s back is still accepted.
        let result = quantizer().quantize_timing(15.0, 16.0, &short);
        assert!(result.aligned);
        assert_eq!(result.start, 5.0);
    }

    #[test]
    fn test_duration_ratio_bounds() {
        // 1.5 s -> 4 s is a ratio above 2.0.
        let result = quantizer().quantize_timing(2.0, 1.5, &grid(0.9));
        assert_eq!(result.reason, Some(QuantizeRejection::Unreasonable));

        // Tight ratio window rejects what the default accepts.
        let strict = BeatQuantizer::new(QuantizerConfig {
            min_duration_ratio: 0.9,
            max_duration_ratio: 1.1,
            ..QuantizerConfig::default()
        });
        let result = strict.quantize_timing(2.0, 6.0, &grid(0.9));
        assert_eq!(result.reason, Some(QuantizeRejection::Unreasonable));
        assert!(quantizer().quantize_timing(2.0, 6.0, &grid(0.9)).aligned);
    }

    #[test]
    fn test_never_snaps_forward() {
        let g = grid(0.9);
        for i in 0..200 {
            let start = i as f64 * 0.37;
            let result = quantizer().quantize_timing(start, 20.0, &g);
            assert!(result.start <= start, "start {} -> {}", start, result.start);
        }
    }

    fn segment(time: f64, score: f64, audio_duration: f64) -> Segment {
        let peak = Peak {
            time,
            score,
            seed_based: false,
        };
        SegmentBuilder::new(15.0, 30.0, 10.0)
            .build(&[peak], Some(audio_duration))
            .unwrap()
            .remove(0)
    }

    #[test]
    fn test_snap_past_audio_end_rejected() {
        // Clamped clip [85, 100] would become 8 bars = 16 s, ending at 101.
        let seg = segment(95.0, 0.9, 100.0);
        assert_eq!(seg.end, 100.0);
        assert!(quantizer().quantize(&seg, &grid(0.9), None).aligned);

        let result = quantizer().quantize(&seg, &grid(0.9), Some(100.0));
        assert!(!result.aligned);
        assert_eq!(result.reason, Some(QuantizeRejection::Unreasonable));
        assert_eq!(result.start, 85.0);
        assert_eq!(result.duration, 15.0);
    }

    #[test]
    fn test_snap_ending_exactly_at_audio_end_accepted() {
        // [60, 89.25] snaps to [60, 92]; audio of exactly 92 s still fits.
        let seg = segment(70.0, 0.95, 92.0);
        let result = quantizer().quantize(&seg, &grid(0.9), Some(92.0));
        assert!(result.aligned);
        assert_eq!(result.start + result.duration, 92.0);
    }

    #[test]
    fn test_rejection_tags() {
        assert_eq!(QuantizeRejection::LowConfidence.to_string(), "low_confidence");
        assert_eq!(
            serde_json::to_string(&QuantizeRejection::Unreasonable).unwrap(),
            "\"unreasonable_quantization\""
        );
        assert_eq!(QuantizeRejection::NoBeatGrid.as_str(), "no_beat_grid");
    }
}
