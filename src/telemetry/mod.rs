//! Progress telemetry for analysis runs.
//!
//! The pipeline reports to a [`ProgressObserver`] passed in by the caller.
//! Observers either discard events, keep a bounded history, or fan events
//! out over a tokio broadcast channel.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

pub mod events;

pub use events::{PipelineStage, ProgressEvent};

/// Receives progress events from the pipeline.
///
/// Called synchronously between stages, so implementations should return
/// quickly.
pub trait ProgressObserver: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}

/// Observer that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl ProgressObserver for NullObserver {
    fn on_event(&self, _event: &ProgressEvent) {}
}

/// Snapshot of a [`RecordingObserver`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub recent: Vec<ProgressEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
}

/// Observer retaining a bounded history of events.
pub struct RecordingObserver {
    history: Mutex<VecDeque<ProgressEvent>>,
    history_capacity: usize,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
}

impl RecordingObserver {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            total_events: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let history = self
            .history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        ProgressSnapshot {
            recent: history.iter().cloned().collect(),
            total_events: self.total_events.load(Ordering::Relaxed),
            dropped_events: self.dropped_history.load(Ordering::Relaxed),
        }
    }

    /// Recorded events, oldest first.
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.snapshot().recent
    }
}

impl Default for RecordingObserver {
    fn default() -> Self {
        Self::new(64)
    }
}

impl ProgressObserver for RecordingObserver {
    fn on_event(&self, event: &ProgressEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        let mut history = self
            .history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if self.history_capacity == 0 {
            self.dropped_history.fetch_add(1, Ordering::Relaxed);
            return;
        }
        if history.len() == self.history_capacity {
            history.pop_front();
            self.dropped_history.fetch_add(1, Ordering::Relaxed);
        }
        history.push_back(event.clone());
    }
}

/// Observer that forwards events to every broadcast subscriber.
///
/// Sending never blocks; with no subscribers events are dropped.
pub struct BroadcastObserver {
    tx: broadcast::Sender<ProgressEvent>,
}

impl BroadcastObserver {
    pub fn new(buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastObserver {
    fn default() -> Self {
        Self::new(256)
    }
}

impl ProgressObserver for BroadcastObserver {
    fn on_event(&self, event: &ProgressEvent) {
        let _ = self.tx.send(event.clone());
    }
}

/// Counters and timings collected over one analysis run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Wall time per completed stage in milliseconds
    pub stage_durations_ms: BTreeMap<PipelineStage, f64>,
    pub total_duration_ms: f64,
    pub curve_samples: usize,
    pub requested_clips: usize,
    pub peaks_found: usize,
    pub seed_peaks: usize,
    pub segments_built: usize,
    pub aligned_segments: usize,
    /// Rejected quantizations keyed by reason tag
    pub rejected_alignments: BTreeMap<String, usize>,
}

impl RunMetrics {
    pub fn record_stage(&mut self, stage: PipelineStage, duration_ms: f64) {
        self.stage_durations_ms.insert(stage, duration_ms);
    }

    pub fn stage_duration_ms(&self, stage: PipelineStage) -> Option<f64> {
        self.stage_durations_ms.get(&stage).copied()
    }

    pub fn record_rejection(&mut self, reason: &str) {
        *self
            .rejected_alignments
            .entry(reason.to_string())
            .or_insert(0) += 1;
    }
}
