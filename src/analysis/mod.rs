// Analysis module - highlight selection stages
//
// Pure, single-threaded stages that turn a novelty curve into highlight clips.
// The orchestration (cancellation, progress, metrics) lives in `pipeline`.
//
// Architecture:
// - NoveltyCurve: validated (time, score) samples from the feature extractor
// - Pipeline: PeakSelector → SegmentBuilder → BeatQuantizer
// - BeatGridBuilder: turns raw beat-tracker output into the grid the
//   quantizer snaps to

pub mod beat_grid;
pub mod curve;
pub mod peaks;
pub mod quantizer;
pub mod segments;

pub use beat_grid::{BeatGrid, BeatGridBuilder, BeatTrack};
pub use curve::NoveltyCurve;
pub use peaks::{Peak, PeakSelector};
pub use quantizer::{BeatQuantizer, QuantizeRejection, QuantizedTiming};
pub use segments::{Segment, SegmentBuilder};

/// Round to millisecond precision, the resolution of every emitted time.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
