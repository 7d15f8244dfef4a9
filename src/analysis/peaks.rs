//! PeakSelector - top-K novelty peaks under a spacing constraint
//!
//! Selection runs in three passes over a validated [`NoveltyCurve`]:
//! 1. Candidate detection: local maxima whose prominence reaches the threshold
//! 2. Greedy packing: highest score first, skipping anything closer than
//!    `spacing_seconds` to an accepted peak, until K are accepted
//! 3. Seed override: every seed contributes the strongest sample in its
//!    search window; automatic peaks that crowd a seed peak are dropped
//!
//! The result is time-ascending, holds at most K peaks, and any two peaks
//! are at least `spacing_seconds` apart.

use serde::{Deserialize, Serialize};

use super::curve::NoveltyCurve;
use crate::config::AnalysisConfig;
use crate::error::{validate_seeds, InputError};

/// Default minimum prominence for candidate peaks
pub const DEFAULT_PROMINENCE: f64 = 0.1;

/// Default half-width of the seed search window in seconds
pub const DEFAULT_SEED_WINDOW_SECONDS: f64 = 20.0;

/// A selected moment of interest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    /// Peak time in seconds
    pub time: f64,
    /// Novelty score at the peak (0.0-1.0)
    pub score: f64,
    /// True when the peak was forced by a user seed
    pub seed_based: bool,
}

/// Selects at most K peaks from a novelty curve.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakSelector {
    clips_count: usize,
    spacing_seconds: f64,
    prominence: f64,
    seed_window_seconds: f64,
}

impl PeakSelector {
    /// Create a selector for `clips_count` peaks separated by `spacing_seconds`
    pub fn new(clips_count: usize, spacing_seconds: f64) -> Self {
        Self {
            clips_count,
            spacing_seconds,
            prominence: DEFAULT_PROMINENCE,
            seed_window_seconds: DEFAULT_SEED_WINDOW_SECONDS,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.clips_count, config.spacing_seconds)
            .with_prominence(config.prominence)
            .with_seed_window(config.seed_window_seconds)
    }

    pub fn with_prominence(mut self, prominence: f64) -> Self {
        self.prominence = prominence;
        self
    }

    pub fn with_seed_window(mut self, seconds: f64) -> Self {
        self.seed_window_seconds = seconds;
        self
    }

    /// Select peaks from `curve`, honoring `seeds`.
    ///
    /// # Returns
    /// * `Ok(peaks)` - time-ascending, `len <= clips_count`
    /// * `Err(InputError::InvalidSeed)` - a seed is negative or non-finite
    pub fn select(&self, curve: &NoveltyCurve, seeds: &[f64]) -> Result<Vec<Peak>, InputError> {
        validate_seeds(seeds)?;

        if self.clips_count == 0 || curve.is_empty() {
            tracing::debug!(
                "[PeakSelector] Nothing to select (clips_count={}, samples={})",
                self.clips_count,
                curve.len()
            );
            return Ok(Vec::new());
        }

        let candidates = find_candidates(curve.scores(), self.prominence);
        let mut auto_peaks = self.pack_greedy(curve, &candidates);
        tracing::debug!(
            "[PeakSelector] {} candidates, {} accepted before seeds",
            candidates.len(),
            auto_peaks.len()
        );

        let mut seed_peaks = self.seed_peaks(curve, seeds);
        if !seed_peaks.is_empty() {
            let before = auto_peaks.len();
            auto_peaks.retain(|peak| {
                seed_peaks
                    .iter()
                    .all(|seed| (seed.time - peak.time).abs() >= self.spacing_seconds)
            });
            tracing::debug!(
                "[PeakSelector] {} seed peaks displaced {} automatic peaks",
                seed_peaks.len(),
                before - auto_peaks.len()
            );
        }

        // Seeds keep priority; automatic peaks fill what is left of K.
        seed_peaks.truncate(self.clips_count);
        auto_peaks.truncate(self.clips_count - seed_peaks.len());

        let mut peaks = seed_peaks;
        peaks.extend(auto_peaks);
        peaks.sort_by(|a, b| a.time.total_cmp(&b.time));

        tracing::info!("[PeakSelector] Selected {} peaks", peaks.len());
        Ok(peaks)
    }

    /// Greedy top-K packing of candidate indices, strongest first.
    ///
    /// The returned peaks stay in acceptance order (score descending).
    fn pack_greedy(&self, curve: &NoveltyCurve, candidates: &[usize]) -> Vec<Peak> {
        let times = curve.times();
        let scores = curve.scores();

        let mut order = candidates.to_vec();
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));

        let mut accepted: Vec<Peak> = Vec::with_capacity(self.clips_count);
        for idx in order {
            if accepted.len() == self.clips_count {
                break;
            }
            let time = times[idx];
            if accepted
                .iter()
                .all(|peak| (peak.time - time).abs() >= self.spacing_seconds)
            {
                accepted.push(Peak {
                    time,
                    score: scores[idx],
                    seed_based: false,
                });
            }
        }
        accepted
    }

    /// One mandatory peak per seed, merged so seed peaks respect the spacing.
    ///
    /// Returned in score-descending order.
    fn seed_peaks(&self, curve: &NoveltyCurve, seeds: &[f64]) -> Vec<Peak> {
        let mut found: Vec<Peak> = seeds
            .iter()
            .filter_map(|&seed| self.seed_peak(curve, seed))
            .collect();
        found.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.time.total_cmp(&b.time)));

        let mut merged: Vec<Peak> = Vec::with_capacity(found.len());
        for peak in found {
            if merged
                .iter()
                .all(|kept| (kept.time - peak.time).abs() >= self.spacing_seconds)
            {
                merged.push(peak);
            } else {
                tracing::debug!(
                    "[PeakSelector] Seed peak at {:.3}s merged into a stronger nearby seed",
                    peak.time
                );
            }
        }
        merged
    }

    /// Strongest sample within `seed_window_seconds` of the seed.
    ///
    /// Seeds beyond the curve are clamped to its time range first, so every
    /// seed resolves to a sample of a non-empty curve.
    fn seed_peak(&self, curve: &NoveltyCurve, seed: f64) -> Option<Peak> {
        let (first, last) = curve.time_range()?;
        let times = curve.times();
        let scores = curve.scores();

        let center = seed.clamp(first, last);
        let lo = center - self.seed_window_seconds;
        let hi = center + self.seed_window_seconds;
        let start = times.partition_point(|&t| t < lo);
        let end = times.partition_point(|&t| t <= hi);

        let best = if start < end {
            (start..end).fold(start, |best, i| if scores[i] > scores[best] { i } else { best })
        } else {
            nearest_index(times, center)
        };

        Some(Peak {
            time: times[best],
            score: scores[best],
            seed_based: true,
        })
    }
}

/// Indices of local maxima with prominence of at least `min_prominence`.
pub fn find_candidates(scores: &[f64], min_prominence: f64) -> Vec<usize> {
    local_maxima(scores)
        .into_iter()
        .filter(|&peak| prominence(scores, peak) >= min_prominence)
        .collect()
}

/// Local maxima of `x`; a flat top resolves to its middle sample.
///
/// The first and last samples are never maxima.
fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if x.len() < 3 {
        return peaks;
    }

    let i_max = x.len() - 1;
    let mut i = 1;
    while i < i_max {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < i_max && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Height of `x[peak]` above the higher of its two surrounding valleys.
///
/// Each valley extends from the peak until a strictly higher sample or the
/// edge of the curve.
fn prominence(x: &[f64], peak: usize) -> f64 {
    let height = x[peak];

    let mut left_min = height;
    for &value in x[..=peak].iter().rev() {
        if value > height {
            break;
        }
        left_min = left_min.min(value);
    }

    let mut right_min = height;
    for &value in &x[peak..] {
        if value > height {
            break;
        }
        right_min = right_min.min(value);
    }

    height - left_min.max(right_min)
}

fn nearest_index(times: &[f64], target: f64) -> usize {
    times
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (*a - target).abs().total_cmp(&(*b - target).abs()))
        .map(|(i, _)| i)
        .unwrap_or(0)
}
