//! SegmentBuilder - maps selected peaks to time-bounded clips
//!
//! Each peak becomes one clip that starts `pre_roll` seconds before the peak
//! and whose length interpolates linearly between the configured minimum and
//! maximum by the peak's novelty score. Clips are clamped to the audio
//! duration when it is known.

use serde::Serialize;

use super::peaks::Peak;
use super::quantizer::QuantizedTiming;
use super::round3;
use crate::config::AnalysisConfig;
use crate::error::{InputError, PipelineError};

/// A highlight clip candidate.
///
/// Built only by [`SegmentBuilder`]. The alignment fields are written once,
/// by [`Segment::apply_alignment`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    /// 1-based position in time order
    pub id: u32,
    pub start: f64,
    pub end: f64,
    pub center: f64,
    pub score: f64,
    /// Always `end - start`
    pub length: f64,
    pub seed_based: bool,
    /// True when the boundaries were snapped to the beat grid
    pub aligned: bool,
    pub original_start: Option<f64>,
    pub original_duration: Option<f64>,
    pub bar_count: Option<u32>,
    /// Audio shorter than the minimum clip length; clip covers the whole file
    pub degenerate: bool,
    #[serde(skip)]
    alignment_applied: bool,
}

impl Segment {
    /// Whether an alignment decision has already been applied
    pub fn alignment_applied(&self) -> bool {
        self.alignment_applied
    }

    /// Rewrite timing fields from a quantization decision.
    ///
    /// Rejected decisions still count: a segment takes exactly one alignment
    /// pass, after which further attempts fail with `AlreadyAligned`.
    pub fn apply_alignment(&self, timing: &QuantizedTiming) -> Result<Segment, PipelineError> {
        if self.alignment_applied {
            return Err(PipelineError::AlreadyAligned { clip_id: self.id });
        }

        let mut updated = self.clone();
        updated.alignment_applied = true;
        if !timing.aligned {
            return Ok(updated);
        }

        let start = round3(timing.start);
        let length = round3(timing.duration);
        let end = round3(start + length);
        updated.start = start;
        updated.length = length;
        updated.end = end;
        updated.center = round3((start + end) / 2.0);
        updated.aligned = true;
        updated.original_start = timing.original_start.map(round3);
        updated.original_duration = timing.original_duration.map(round3);
        updated.bar_count = timing.bar_count;
        Ok(updated)
    }
}

/// Builds segments from time-sorted peaks.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentBuilder {
    min_clip_length: f64,
    max_clip_length: f64,
    pre_roll: f64,
}

impl SegmentBuilder {
    pub fn new(min_clip_length: f64, max_clip_length: f64, pre_roll: f64) -> Self {
        Self {
            min_clip_length,
            max_clip_length,
            pre_roll,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(
            config.min_clip_length,
            config.max_clip_length,
            config.pre_roll,
        )
    }

    /// Clip length for a novelty score: higher scores get longer clips.
    pub fn clip_length(&self, score: f64) -> f64 {
        let length = self.min_clip_length + score * (self.max_clip_length - self.min_clip_length);
        length.clamp(self.min_clip_length, self.max_clip_length)
    }

    /// Map peaks to segments.
    ///
    /// # Arguments
    /// * `peaks` - selected peaks (sorted by time here if they are not already)
    /// * `audio_duration` - file length in seconds, when known
    ///
    /// # Returns
    /// Segments with ids `1..=n` in time order. Zero-length audio yields no
    /// segments; audio shorter than the minimum clip length yields clips
    /// spanning `[0, audio_duration]` marked `degenerate`.
    pub fn build(
        &self,
        peaks: &[Peak],
        audio_duration: Option<f64>,
    ) -> Result<Vec<Segment>, InputError> {
        if let Some(duration) = audio_duration {
            if !duration.is_finite() || duration < 0.0 {
                return Err(InputError::InvalidDuration { value: duration });
            }
            if duration == 0.0 {
                tracing::warn!("[SegmentBuilder] Audio duration is zero, no segments built");
                return Ok(Vec::new());
            }
        }

        if peaks.is_empty() {
            tracing::warn!("[SegmentBuilder] No peaks found, returning empty segments");
            return Ok(Vec::new());
        }

        let mut ordered = peaks.to_vec();
        ordered.sort_by(|a, b| a.time.total_cmp(&b.time));

        let mut segments = Vec::with_capacity(ordered.len());
        for peak in &ordered {
            let mut start = (peak.time - self.pre_roll).max(0.0);
            let mut end = start + self.clip_length(peak.score);
            let mut degenerate = false;

            if let Some(duration) = audio_duration {
                if end > duration {
                    end = duration;
                    if end - start < self.min_clip_length {
                        // Keep the minimum viable clip by moving the start back.
                        start = (end - self.min_clip_length).max(0.0);
                    }
                    degenerate = duration < self.min_clip_length;
                }
            }

            let start = round3(start);
            let mut end = round3(end);
            if let Some(duration) = audio_duration {
                if end > duration {
                    // Rounding must not carry the end past the audio.
                    end = ((duration * 1000.0).floor() / 1000.0).min(duration);
                }
            }
            let length = round3(end - start);
            if length <= 0.0 {
                tracing::warn!(
                    "[SegmentBuilder] Dropping empty clip for peak at {:.3}s",
                    peak.time
                );
                continue;
            }
            if degenerate {
                tracing::warn!(
                    "[SegmentBuilder] Audio ({:.3}s) shorter than minimum clip length ({:.3}s)",
                    end,
                    self.min_clip_length
                );
            }

            segments.push(Segment {
                id: segments.len() as u32 + 1,
                start,
                end,
                center: round3((start + end) / 2.0),
                score: round3(peak.score),
                length,
                seed_based: peak.seed_based,
                aligned: false,
                original_start: None,
                original_duration: None,
                bar_count: None,
                degenerate,
                alignment_applied: false,
            });
        }

        tracing::info!("[SegmentBuilder] Built {} segments", segments.len());
        Ok(segments)
    }
}
