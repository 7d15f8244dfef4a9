//! Analyzer - runs the highlight stages in order
//!
//! Stages: peak selection → segment building → (beat grid → beat
//! quantization). The beat stages run only when alignment is requested and
//! the input carries a beat track. Each stage is timed and reported to the
//! caller's observer; the cancellation token is checked before each one.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::analysis::{
    BeatGrid, BeatGridBuilder, BeatQuantizer, BeatTrack, NoveltyCurve, Peak, PeakSelector,
    QuantizeRejection, Segment, SegmentBuilder,
};
use crate::config::AnalysisConfig;
use crate::error::{
    log_config_error, log_pipeline_error, ConfigError, ErrorCode, InputError, PipelineError,
};
use crate::telemetry::{PipelineStage, ProgressEvent, ProgressObserver, RunMetrics};

mod cancellation;

pub use cancellation::CancellationToken;

/// Upstream data for one run: the novelty curve, an optional beat track and
/// the audio length when the extractor reported it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisInput {
    pub novelty: NoveltyCurve,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beats: Option<BeatTrack>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_duration: Option<f64>,
}

impl AnalysisInput {
    pub fn new(novelty: NoveltyCurve) -> Self {
        Self {
            novelty,
            beats: None,
            audio_duration: None,
        }
    }

    pub fn with_beats(mut self, beats: BeatTrack) -> Self {
        self.beats = Some(beats);
        self
    }

    pub fn with_audio_duration(mut self, seconds: f64) -> Self {
        self.audio_duration = Some(seconds);
        self
    }

    /// Check the parts serde cannot: the audio duration and the beat track.
    pub fn validate(&self) -> Result<(), InputError> {
        if let Some(duration) = self.audio_duration {
            if !duration.is_finite() || duration < 0.0 {
                return Err(InputError::InvalidDuration { value: duration });
            }
        }
        if let Some(track) = &self.beats {
            BeatGridBuilder::new().build_from_track(track)?;
        }
        Ok(())
    }
}

/// Everything one run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub peaks: Vec<Peak>,
    pub segments: Vec<Segment>,
    pub grid: Option<BeatGrid>,
    pub metrics: RunMetrics,
}

/// Highlight analysis orchestrator.
///
/// Holds an immutable, validated configuration; one analyzer can serve any
/// number of runs, including concurrent ones.
#[derive(Debug, Clone)]
pub struct Analyzer {
    config: AnalysisConfig,
    selector: PeakSelector,
    builder: SegmentBuilder,
    grid_builder: BeatGridBuilder,
    quantizer: BeatQuantizer,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig) -> Result<Self, ConfigError> {
        if let Err(err) = config.validate() {
            log_config_error(&err, "Analyzer::new");
            return Err(err);
        }
        Ok(Self {
            selector: PeakSelector::from_config(&config),
            builder: SegmentBuilder::from_config(&config),
            grid_builder: BeatGridBuilder::new(),
            quantizer: BeatQuantizer::new(config.quantizer),
            config,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Run every stage over `input`.
    ///
    /// # Returns
    /// * `Ok(outcome)` - possibly empty; no peaks or rejected alignments are
    ///   not failures
    /// * `Err(PipelineError::Input)` - malformed curve, seeds, duration or beats
    /// * `Err(PipelineError::Cancelled)` - token set before a stage started
    pub fn analyze(
        &self,
        input: &AnalysisInput,
        observer: &dyn ProgressObserver,
        cancel: &CancellationToken,
    ) -> Result<AnalysisOutcome, PipelineError> {
        let run_started = Instant::now();
        let mut metrics = RunMetrics {
            curve_samples: input.novelty.len(),
            requested_clips: self.config.clips_count,
            ..RunMetrics::default()
        };
        let audio_duration = self.config.audio_duration.or(input.audio_duration);

        tracing::info!(
            "[Analyzer] Starting analysis: samples={}, clips={}, seeds={}, align_to_beat={}",
            input.novelty.len(),
            self.config.clips_count,
            self.config.seed_timestamps.len(),
            self.config.align_to_beat
        );

        let peaks = self.run_stage(
            PipelineStage::PeakSelection,
            observer,
            cancel,
            &mut metrics,
            || Ok(self.selector.select(&input.novelty, &self.config.seed_timestamps)?),
            |peaks| peaks.len(),
        )?;
        metrics.peaks_found = peaks.len();
        metrics.seed_peaks = peaks.iter().filter(|p| p.seed_based).count();

        let mut segments = self.run_stage(
            PipelineStage::SegmentBuilding,
            observer,
            cancel,
            &mut metrics,
            || Ok(self.builder.build(&peaks, audio_duration)?),
            |segments| segments.len(),
        )?;
        metrics.segments_built = segments.len();

        let mut grid = None;
        if self.config.align_to_beat {
            match &input.beats {
                Some(track) => {
                    let built = self.run_stage(
                        PipelineStage::BeatGrid,
                        observer,
                        cancel,
                        &mut metrics,
                        || Ok(self.grid_builder.build_from_track(track)?),
                        |grid| grid.beat_times().len(),
                    )?;

                    let (aligned, rejections) = self.run_stage(
                        PipelineStage::BeatQuantization,
                        observer,
                        cancel,
                        &mut metrics,
                        || self.align_segments(&segments, &built, audio_duration),
                        |(aligned, _)| aligned.iter().filter(|s| s.aligned).count(),
                    )?;
                    for reason in &rejections {
                        metrics.record_rejection(reason.as_str());
                    }
                    metrics.aligned_segments = aligned.iter().filter(|s| s.aligned).count();
                    segments = aligned;
                    grid = Some(built);
                }
                None => {
                    tracing::warn!("[Analyzer] Beat alignment requested but no beat track given");
                    observer.on_event(&ProgressEvent::Info {
                        stage: Some(PipelineStage::BeatGrid),
                        message: "no beat track available, skipping beat alignment".to_string(),
                    });
                }
            }
        }

        metrics.total_duration_ms = elapsed_ms(run_started);
        tracing::info!(
            "[Analyzer] Analysis complete: {} peaks, {} segments, {} aligned in {:.2}ms",
            metrics.peaks_found,
            metrics.segments_built,
            metrics.aligned_segments,
            metrics.total_duration_ms
        );

        Ok(AnalysisOutcome {
            peaks,
            segments,
            grid,
            metrics,
        })
    }

    fn align_segments(
        &self,
        segments: &[Segment],
        grid: &BeatGrid,
        audio_duration: Option<f64>,
    ) -> Result<(Vec<Segment>, Vec<QuantizeRejection>), PipelineError> {
        let mut aligned = Vec::with_capacity(segments.len());
        let mut rejections = Vec::new();
        for segment in segments {
            let timing = self.quantizer.quantize(segment, grid, audio_duration);
            if let Some(reason) = timing.reason {
                rejections.push(reason);
            }
            aligned.push(segment.apply_alignment(&timing)?);
        }
        Ok((aligned, rejections))
    }

    fn run_stage<T>(
        &self,
        stage: PipelineStage,
        observer: &dyn ProgressObserver,
        cancel: &CancellationToken,
        metrics: &mut RunMetrics,
        run: impl FnOnce() -> Result<T, PipelineError>,
        items: impl FnOnce(&T) -> usize,
    ) -> Result<T, PipelineError> {
        if cancel.is_cancelled() {
            let err = PipelineError::Cancelled { stage };
            tracing::info!("[Analyzer] Cancelled before {}", stage);
            report_error(observer, stage, &err);
            return Err(err);
        }

        observer.on_event(&ProgressEvent::StageStarted { stage });
        tracing::debug!("[Analyzer] Stage {} started", stage);
        let started = Instant::now();

        let output = match run() {
            Ok(output) => output,
            Err(err) => {
                log_pipeline_error(&err, stage.as_str());
                report_error(observer, stage, &err);
                return Err(err);
            }
        };

        let duration_ms = elapsed_ms(started);
        let items = items(&output);
        metrics.record_stage(stage, duration_ms);
        observer.on_event(&ProgressEvent::StageCompleted {
            stage,
            duration_ms,
            items,
        });
        tracing::debug!(
            "[Analyzer] Stage {} completed in {:.3}ms ({} items)",
            stage,
            duration_ms,
            items
        );
        Ok(output)
    }
}

fn report_error(observer: &dyn ProgressObserver, stage: PipelineStage, err: &PipelineError) {
    observer.on_event(&ProgressEvent::Error {
        stage: Some(stage),
        code: err.root_code(),
        message: err.message(),
    });
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{NullObserver, RecordingObserver};

    fn spiky_input() -> AnalysisInput {
        let times: Vec<f64> = (0..240).map(|i| i as f64 * 0.5).collect();
        let scores = times
            .iter()
            .map(|&t| match t {
                t if t == 20.0 => 0.9,
                t if t == 60.0 => 0.6,
                t if t == 100.0 => 0.3,
                _ => 0.0,
            })
            .collect();
        let beats = BeatTrack {
            tempo: 120.0,
            beat_times: (0..240).map(|i| i as f64 * 0.5).collect(),
        };
        AnalysisInput::new(NoveltyCurve::new(times, scores).unwrap())
            .with_beats(beats)
            .with_audio_duration(120.0)
    }

    fn stages(events: &[ProgressEvent]) -> Vec<PipelineStage> {
        events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::StageCompleted { stage, .. } => Some(*stage),
                _ => None,
            })
            .collect()
    }

    /// Cancels the token once the given stage completes.
    struct CancelAfter {
        stage: PipelineStage,
        token: CancellationToken,
    }

    impl ProgressObserver for CancelAfter {
        fn on_event(&self, event: &ProgressEvent) {
            if let ProgressEvent::StageCompleted { stage, .. } = event {
                if *stage == self.stage {
                    self.token.cancel();
                }
            }
        }
    }

    #[test]
    fn test_runs_two_stages_without_alignment() {
        let analyzer = Analyzer::new(AnalysisConfig::default()).unwrap();
        let observer = RecordingObserver::default();
        let outcome = analyzer
            .analyze(&spiky_input(), &observer, &CancellationToken::new())
            .unwrap();

        assert_eq!(outcome.peaks.len(), 3);
        assert_eq!(outcome.segments.len(), 3);
        assert!(outcome.grid.is_none());
        assert_eq!(
            stages(&observer.events()),
            vec![PipelineStage::PeakSelection, PipelineStage::SegmentBuilding]
        );
        assert_eq!(outcome.metrics.curve_samples, 240);
        assert_eq!(outcome.metrics.requested_clips, 6);
        assert_eq!(outcome.metrics.segments_built, 3);
        assert!(outcome
            .metrics
            .stage_duration_ms(PipelineStage::SegmentBuilding)
            .is_some());
    }

    #[test]
    fn test_alignment_stages_run_when_requested() {
        let config = AnalysisConfig {
            align_to_beat: true,
            ..AnalysisConfig::default()
        };
        let analyzer = Analyzer::new(config).unwrap();
        let observer = RecordingObserver::default();
        let outcome = analyzer
            .analyze(&spiky_input(), &observer, &CancellationToken::new())
            .unwrap();

        assert_eq!(
            stages(&observer.events()),
            vec![
                PipelineStage::PeakSelection,
                PipelineStage::SegmentBuilding,
                PipelineStage::BeatGrid,
                PipelineStage::BeatQuantization
            ]
        );
        let grid = outcome.grid.as_ref().unwrap();
        assert!((grid.confidence() - 1.0).abs() < 1e-9);
        assert_eq!(outcome.metrics.aligned_segments, 3);
        assert!(outcome.segments.iter().all(|s| s.aligned));
        assert!(outcome.segments.iter().all(|s| s.alignment_applied()));
    }

    #[test]
    fn test_alignment_keeps_clamped_clip_inside_audio() {
        let times: Vec<f64> = (0..200).map(|i| i as f64 * 0.5).collect();
        let scores = times
            .iter()
            .map(|&t| if t == 95.0 { 0.9 } else { 0.0 })
            .collect();
        let input = AnalysisInput::new(NoveltyCurve::new(times.clone(), scores).unwrap())
            .with_beats(BeatTrack {
                tempo: 120.0,
                beat_times: times,
            })
            .with_audio_duration(100.0);
        let config = AnalysisConfig {
            align_to_beat: true,
            ..AnalysisConfig::default()
        };

        let outcome = Analyzer::new(config)
            .unwrap()
            .analyze(&input, &NullObserver, &CancellationToken::new())
            .unwrap();

        assert_eq!(outcome.segments.len(), 1);
        let seg = &outcome.segments[0];
        // 8 bars from 85 s would end at 101 s.
        assert!(!seg.aligned);
        assert_eq!(seg.start, 85.0);
        assert_eq!(seg.end, 100.0);
        assert_eq!(outcome.metrics.aligned_segments, 0);
        assert_eq!(
            outcome
                .metrics
                .rejected_alignments
                .get("unreasonable_quantization"),
            Some(&1)
        );
    }

    #[test]
    fn test_alignment_skipped_without_beats() {
        let config = AnalysisConfig {
            align_to_beat: true,
            ..AnalysisConfig::default()
        };
        let analyzer = Analyzer::new(config).unwrap();
        let observer = RecordingObserver::default();
        let mut input = spiky_input();
        input.beats = None;

        let outcome = analyzer
            .analyze(&input, &observer, &CancellationToken::new())
            .unwrap();
        assert!(outcome.grid.is_none());
        assert!(outcome.segments.iter().all(|s| !s.aligned));
        assert!(observer
            .events()
            .iter()
            .any(|e| matches!(e, ProgressEvent::Info { .. })));
    }

    #[test]
    fn test_cancel_before_first_stage() {
        let analyzer = Analyzer::new(AnalysisConfig::default()).unwrap();
        let observer = RecordingObserver::default();
        let token = CancellationToken::new();
        token.cancel();

        let err = analyzer
            .analyze(&spiky_input(), &observer, &token)
            .unwrap_err();
        assert_eq!(
            err,
            PipelineError::Cancelled {
                stage: PipelineStage::PeakSelection
            }
        );
        assert!(stages(&observer.events()).is_empty());
    }

    #[test]
    fn test_cancel_between_stages() {
        let analyzer = Analyzer::new(AnalysisConfig::default()).unwrap();
        let token = CancellationToken::new();
        let observer = CancelAfter {
            stage: PipelineStage::PeakSelection,
            token: token.clone(),
        };

        let err = analyzer
            .analyze(&spiky_input(), &observer, &token)
            .unwrap_err();
        assert_eq!(
            err,
            PipelineError::Cancelled {
                stage: PipelineStage::SegmentBuilding
            }
        );
    }

    #[test]
    fn test_invalid_seed_reports_error_event() {
        let config = AnalysisConfig {
            seed_timestamps: vec![f64::INFINITY],
            ..AnalysisConfig::default()
        };
        let analyzer = Analyzer::new(config).unwrap();
        let observer = RecordingObserver::default();

        let err = analyzer
            .analyze(&spiky_input(), &observer, &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Input(InputError::InvalidSeed { .. })
        ));
        assert!(observer.events().iter().any(|e| matches!(
            e,
            ProgressEvent::Error {
                stage: Some(PipelineStage::PeakSelection),
                ..
            }
        )));
    }

    #[test]
    fn test_config_duration_overrides_input() {
        let config = AnalysisConfig {
            audio_duration: Some(50.0),
            ..AnalysisConfig::default()
        };
        let analyzer = Analyzer::new(config).unwrap();
        let outcome = analyzer
            .analyze(
                &spiky_input(),
                &NullObserver,
                &CancellationToken::new(),
            )
            .unwrap();
        assert!(outcome.segments.iter().all(|s| s.end <= 50.0));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = AnalysisConfig {
            clips_count: 51,
            ..AnalysisConfig::default()
        };
        assert!(Analyzer::new(config).is_err());
    }

    #[test]
    fn test_input_validation() {
        let input = spiky_input().with_audio_duration(-1.0);
        assert!(matches!(
            input.validate(),
            Err(InputError::InvalidDuration { .. })
        ));

        let json = r#"{"novelty": {"times": [0.0, 1.0], "scores": [0.1, 0.2]}}"#;
        let parsed: AnalysisInput = serde_json::from_str(json).unwrap();
        assert!(parsed.beats.is_none());
        assert!(parsed.validate().is_ok());
    }
}
