//! Result export: JSON report and CSV clip list.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::{round3, BeatGrid, Segment};
use crate::config::AnalysisConfig;
use crate::pipeline::AnalysisOutcome;
use crate::telemetry::RunMetrics;

/// Report format version
pub const REPORT_VERSION: &str = "1.0.0";

/// CSV column order
pub const CSV_HEADER: &str = "clip_id,start,end,center,score,seed_based,aligned,length";

fn is_false(value: &bool) -> bool {
    !*value
}

/// One clip as written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRecord {
    pub clip_id: u32,
    pub start: f64,
    pub end: f64,
    pub center: f64,
    pub score: f64,
    pub length: f64,
    pub seed_based: bool,
    pub aligned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bars: Option<u32>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub degenerate: bool,
}

impl From<&Segment> for SegmentRecord {
    fn from(segment: &Segment) -> Self {
        Self {
            clip_id: segment.id,
            start: segment.start,
            end: segment.end,
            center: segment.center,
            score: segment.score,
            length: segment.length,
            seed_based: segment.seed_based,
            aligned: segment.aligned,
            original_start: segment.original_start,
            original_duration: segment.original_duration,
            bars: segment.bar_count,
            degenerate: segment.degenerate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub version: String,
    pub created_at: DateTime<Utc>,
    /// Fixture name or input path the run analyzed
    pub source: String,
    pub audio_duration: Option<f64>,
    pub configuration: AnalysisConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_clips: usize,
    pub seed_based_clips: usize,
    pub auto_detected_clips: usize,
    pub average_score: f64,
    pub total_duration: f64,
    /// Share of the audio covered by clips; zero when the duration is unknown
    pub coverage_percentage: f64,
}

impl ReportSummary {
    pub fn from_records(records: &[SegmentRecord], audio_duration: Option<f64>) -> Self {
        let total_clips = records.len();
        let seed_based_clips = records.iter().filter(|r| r.seed_based).count();
        let total_duration: f64 = records.iter().map(|r| r.length).sum();
        let average_score = if total_clips == 0 {
            0.0
        } else {
            records.iter().map(|r| r.score).sum::<f64>() / total_clips as f64
        };
        let coverage_percentage = match audio_duration {
            Some(duration) if duration > 0.0 => total_duration / duration * 100.0,
            _ => 0.0,
        };

        Self {
            total_clips,
            seed_based_clips,
            auto_detected_clips: total_clips - seed_based_clips,
            average_score: round3(average_score),
            total_duration: round3(total_duration),
            coverage_percentage: round3(coverage_percentage),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatSummary {
    pub tempo: f64,
    pub confidence: f64,
    pub beat_count: usize,
    pub bar_count: usize,
}

impl From<&BeatGrid> for BeatSummary {
    fn from(grid: &BeatGrid) -> Self {
        Self {
            tempo: round3(grid.tempo()),
            confidence: round3(grid.confidence()),
            beat_count: grid.beat_times().len(),
            bar_count: grid.bar_times().len(),
        }
    }
}

/// Full JSON report of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub metadata: ReportMetadata,
    pub clips: Vec<SegmentRecord>,
    pub summary: ReportSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beat: Option<BeatSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<RunMetrics>,
}

impl AnalysisReport {
    pub fn from_outcome(
        outcome: &AnalysisOutcome,
        config: &AnalysisConfig,
        source: impl Into<String>,
        audio_duration: Option<f64>,
    ) -> Self {
        let clips: Vec<SegmentRecord> = outcome.segments.iter().map(SegmentRecord::from).collect();
        let summary = ReportSummary::from_records(&clips, audio_duration);

        Self {
            metadata: ReportMetadata {
                version: REPORT_VERSION.to_string(),
                created_at: Utc::now(),
                source: source.into(),
                audio_duration,
                configuration: config.clone(),
            },
            clips,
            summary,
            beat: outcome.grid.as_ref().map(BeatSummary::from),
            metrics: Some(outcome.metrics.clone()),
        }
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        ensure_parent(path)?;
        let json = self.to_json_pretty().context("serializing analysis report")?;
        fs::write(path, json).with_context(|| format!("writing report {}", path.display()))?;
        log::info!("[Export] JSON report written to {}", path.display());
        Ok(())
    }

    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        ensure_parent(path)?;
        let file =
            fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
        write_csv(io::BufWriter::new(file), &self.clips)
            .with_context(|| format!("writing clips to {}", path.display()))?;
        log::info!("[Export] CSV written to {}", path.display());
        Ok(())
    }
}

/// Write clips as CSV with three-decimal times.
pub fn write_csv<W: Write>(mut writer: W, records: &[SegmentRecord]) -> io::Result<()> {
    writeln!(writer, "{}", CSV_HEADER)?;
    for record in records {
        writeln!(
            writer,
            "{},{:.3},{:.3},{:.3},{:.3},{},{},{:.3}",
            record.clip_id,
            record.start,
            record.end,
            record.center,
            record.score,
            record.seed_based,
            record.aligned,
            record.length
        )?;
    }
    writer.flush()
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
    }
    Ok(())
}
