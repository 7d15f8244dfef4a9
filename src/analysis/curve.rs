//! NoveltyCurve - validated novelty time series
//!
//! The curve is produced by an external feature extractor. It is accepted
//! as-is when well formed and rejected otherwise; nothing here resamples,
//! clips or sorts the data.

use serde::{Deserialize, Serialize};

use crate::error::{validate_timeline, InputError};

/// Ordered `(time, score)` samples with `score ∈ [0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNoveltyCurve")]
pub struct NoveltyCurve {
    times: Vec<f64>,
    scores: Vec<f64>,
}

#[derive(Deserialize)]
struct RawNoveltyCurve {
    times: Vec<f64>,
    scores: Vec<f64>,
}

impl TryFrom<RawNoveltyCurve> for NoveltyCurve {
    type Error = InputError;

    fn try_from(raw: RawNoveltyCurve) -> Result<Self, Self::Error> {
        NoveltyCurve::new(raw.times, raw.scores)
    }
}

impl NoveltyCurve {
    /// Build a curve, validating length, finiteness, ordering and score range.
    pub fn new(times: Vec<f64>, scores: Vec<f64>) -> Result<Self, InputError> {
        if times.len() != scores.len() {
            return Err(InputError::LengthMismatch {
                times: times.len(),
                scores: scores.len(),
            });
        }
        validate_timeline("times", &times)?;

        for (index, &value) in scores.iter().enumerate() {
            if !value.is_finite() {
                return Err(InputError::NonFiniteValue {
                    field: "scores",
                    index,
                    value,
                });
            }
            if !(0.0..=1.0).contains(&value) {
                return Err(InputError::ScoreOutOfRange { index, value });
            }
        }

        Ok(Self { times, scores })
    }

    /// A curve with no samples.
    pub fn empty() -> Self {
        Self {
            times: Vec::new(),
            scores: Vec::new(),
        }
    }

    /// Curve sampled on a uniform grid starting at zero.
    pub fn from_uniform(scores: Vec<f64>, step_seconds: f64) -> Result<Self, InputError> {
        let times = (0..scores.len()).map(|i| i as f64 * step_seconds).collect();
        Self::new(times, scores)
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// First and last sample times, if any.
    pub fn time_range(&self) -> Option<(f64, f64)> {
        match (self.times.first(), self.times.last()) {
            (Some(&first), Some(&last)) => Some((first, last)),
            _ => None,
        }
    }
}
