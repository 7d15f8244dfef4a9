//! Fixture utilities for the deterministic CLI harness.
//!
//! A fixture is a JSON [`AnalysisInput`] (`<name>.json`) with an optional
//! expectation file next to it (`<name>.expect.json`) describing the clips
//! the analyzer should produce. The catalog discovers and loads both so CI
//! can replay known inputs without an audio front-end.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::analysis::Segment;
use crate::error::log_input_error;
use crate::export::SegmentRecord;
use crate::pipeline::AnalysisInput;

/// Default location for fixture JSON assets.
pub const DEFAULT_FIXTURE_ROOT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures");

const EXPECT_SUFFIX: &str = ".expect.json";

/// Metadata describing an available fixture.
#[derive(Clone, Debug)]
pub struct FixtureMetadata {
    pub name: String,
    pub input_path: PathBuf,
    pub expect_path: Option<PathBuf>,
}

/// Loaded fixture with validated input.
#[derive(Debug)]
pub struct FixtureData {
    pub metadata: FixtureMetadata,
    pub input: AnalysisInput,
    pub expectations: Option<FixtureExpectations>,
}

/// JSON expectation schema for fixture verification.
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureExpectations {
    pub fixture: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub clips: Vec<ExpectedClip>,
}

impl FixtureExpectations {
    /// Compare produced segments, in order, against the expected clips.
    pub fn verify(&self, actual: &[Segment]) -> std::result::Result<(), ExpectationDiff> {
        let mut failures = Vec::new();

        for (idx, expected) in self.clips.iter().enumerate() {
            match actual.get(idx) {
                Some(segment) => {
                    let start_delta = (segment.start - expected.start).abs();
                    let end_delta = (segment.end - expected.end).abs();
                    let flags_match = expected.aligned.map_or(true, |a| a == segment.aligned)
                        && expected
                            .seed_based
                            .map_or(true, |s| s == segment.seed_based);
                    if start_delta > expected.tolerance_s
                        || end_delta > expected.tolerance_s
                        || !flags_match
                    {
                        failures.push(ExpectationFailure {
                            index: idx,
                            expected: Some(expected.clone()),
                            actual: Some(SegmentRecord::from(segment)),
                            start_delta_s: Some(start_delta),
                            end_delta_s: Some(end_delta),
                        });
                    }
                }
                None => failures.push(ExpectationFailure {
                    index: idx,
                    expected: Some(expected.clone()),
                    actual: None,
                    start_delta_s: None,
                    end_delta_s: None,
                }),
            }
        }

        for (idx, segment) in actual.iter().enumerate().skip(self.clips.len()) {
            failures.push(ExpectationFailure {
                index: idx,
                expected: None,
                actual: Some(SegmentRecord::from(segment)),
                start_delta_s: None,
                end_delta_s: None,
            });
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ExpectationDiff { failures })
        }
    }
}

/// Expected clip definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedClip {
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub aligned: Option<bool>,
    #[serde(default)]
    pub seed_based: Option<bool>,
    #[serde(default = "default_tolerance")]
    pub tolerance_s: f64,
}

fn default_tolerance() -> f64 {
    0.01
}

/// Outcome of comparing actual results with expectations.
#[derive(Debug)]
pub struct ExpectationDiff {
    pub failures: Vec<ExpectationFailure>,
}

impl ExpectationDiff {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "failures": self.failures.iter().map(|failure| {
                serde_json::json!({
                    "index": failure.index,
                    "expected": failure.expected,
                    "actual": failure.actual,
                    "start_delta_s": failure.start_delta_s,
                    "end_delta_s": failure.end_delta_s,
                })
            }).collect::<Vec<_>>()
        })
    }
}

/// Detailed diff entry for a single failure.
///
/// `expected` is `None` for surplus clips; `actual` is `None` for missing ones.
#[derive(Debug)]
pub struct ExpectationFailure {
    pub index: usize,
    pub expected: Option<ExpectedClip>,
    pub actual: Option<SegmentRecord>,
    pub start_delta_s: Option<f64>,
    pub end_delta_s: Option<f64>,
}

/// Catalog responsible for discovering fixtures on disk.
pub struct FixtureCatalog {
    root: PathBuf,
}

impl FixtureCatalog {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List all fixtures by their metadata.
    pub fn discover(&self) -> Result<Vec<FixtureMetadata>> {
        let mut fixtures = Vec::new();
        if !self.root.exists() {
            return Ok(fixtures);
        }

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if is_input_file(&path) {
                fixtures.push(self.metadata_for_path(&path)?);
            }
        }

        fixtures.sort_by(|a, b| a.name.cmp(&b.name));
        log::debug!(
            "[Fixtures] Discovered {} fixtures in {}",
            fixtures.len(),
            self.root.display()
        );
        Ok(fixtures)
    }

    /// Load fixture input + expectations for provided name or path.
    pub fn load(&self, fixture: &str, override_expect: Option<PathBuf>) -> Result<FixtureData> {
        let input_path = self.resolve_fixture_path(fixture)?;
        let metadata = self.metadata_for_path(&input_path)?;

        let json = fs::read_to_string(&input_path)
            .with_context(|| format!("reading fixture {}", input_path.display()))?;
        let input: AnalysisInput = serde_json::from_str(&json)
            .with_context(|| format!("parsing {}", input_path.display()))?;
        if let Err(err) = input.validate() {
            log_input_error(&err, "FixtureCatalog::load");
            return Err(err).with_context(|| format!("validating {}", input_path.display()));
        }

        let expectation_path = override_expect.or(metadata.expect_path.clone());
        let expectations = match expectation_path {
            Some(path) => {
                let json = fs::read_to_string(&path)
                    .with_context(|| format!("reading expectation {}", path.display()))?;
                Some(
                    serde_json::from_str(&json)
                        .with_context(|| format!("parsing {}", path.display()))?,
                )
            }
            None => None,
        };

        log::info!(
            "[Fixtures] Loaded '{}' ({} novelty samples, beats: {})",
            metadata.name,
            input.novelty.len(),
            input.beats.is_some()
        );

        Ok(FixtureData {
            metadata,
            input,
            expectations,
        })
    }

    fn resolve_fixture_path(&self, fixture: &str) -> Result<PathBuf> {
        let as_path = Path::new(fixture);
        if as_path.is_file() {
            return Ok(as_path.to_path_buf());
        }

        let candidate = self.root.join(format!("{fixture}.json"));
        if candidate.is_file() {
            Ok(candidate)
        } else {
            Err(anyhow!(
                "Fixture '{fixture}' not found in {}",
                self.root.display()
            ))
        }
    }

    fn metadata_for_path(&self, input_path: &Path) -> Result<FixtureMetadata> {
        let name = input_path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow!("Invalid fixture name for {}", input_path.display()))?
            .to_string();
        let expect_path = input_path.with_extension("expect.json");
        Ok(FixtureMetadata {
            name,
            input_path: input_path.to_path_buf(),
            expect_path: expect_path.is_file().then_some(expect_path),
        })
    }
}

impl Default for FixtureCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_FIXTURE_ROOT)
    }
}

fn is_input_file(path: &Path) -> bool {
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    file_name.ends_with(".json") && !file_name.ends_with(EXPECT_SUFFIX)
}
