// Highlight Analyzer Core - novelty-driven clip selection
// Peak picking, clip building and beat alignment over precomputed analysis data

// Module declarations
pub mod analysis;
pub mod config;
pub mod error;
pub mod export;
pub mod fixtures;
pub mod pipeline;
pub mod telemetry;

// Re-exports for convenience
pub use analysis::{BeatGrid, BeatTrack, NoveltyCurve, Peak, Segment};
pub use config::AnalysisConfig;
pub use pipeline::{AnalysisInput, AnalysisOutcome, Analyzer, CancellationToken};
