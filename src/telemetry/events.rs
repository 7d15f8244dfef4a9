//! Progress event types describing a highlight analysis run, consumed by
//! observers and streamed as JSON by the CLI.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    PeakSelection,
    SegmentBuilding,
    BeatGrid,
    BeatQuantization,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::PeakSelection => "peak_selection",
            PipelineStage::SegmentBuilding => "segment_building",
            PipelineStage::BeatGrid => "beat_grid",
            PipelineStage::BeatQuantization => "beat_quantization",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events emitted while an analysis runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ProgressEvent {
    StageStarted {
        stage: PipelineStage,
    },
    StageCompleted {
        stage: PipelineStage,
        duration_ms: f64,
        /// Items produced by the stage (peaks, segments, beats, aligned clips)
        items: usize,
    },
    Info {
        stage: Option<PipelineStage>,
        message: String,
    },
    Error {
        stage: Option<PipelineStage>,
        code: i32,
        message: String,
    },
}

impl ProgressEvent {
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            ProgressEvent::StageStarted { stage } => Some(*stage),
            ProgressEvent::StageCompleted { stage, .. } => Some(*stage),
            ProgressEvent::Info { stage, .. } => *stage,
            ProgressEvent::Error { stage, .. } => *stage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names_are_snake_case() {
        assert_eq!(PipelineStage::BeatQuantization.to_string(), "beat_quantization");
        assert_eq!(
            serde_json::to_string(&PipelineStage::PeakSelection).unwrap(),
            "\"peak_selection\""
        );
    }

    #[test]
    fn events_serialize_tagged() {
        let event = ProgressEvent::StageCompleted {
            stage: PipelineStage::SegmentBuilding,
            duration_ms: 1.5,
            items: 4,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "stage_completed");
        assert_eq!(json["payload"]["stage"], "segment_building");
        assert_eq!(json["payload"]["items"], 4);

        let back: ProgressEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.stage(), Some(PipelineStage::SegmentBuilding));
    }
}
