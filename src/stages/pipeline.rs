use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::llm::TransformEngine;
use crate::models::{StageKind, StageOutcome, StageResult, UtteranceSequence};

use super::{execute_epoch, EpochRequest};

/// Configuration for a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Stage 1 preservation rate below which a warning is logged
    pub preservation_threshold: f64,
    /// Upper bound on a single engine call; `None` waits indefinitely
    pub engine_timeout: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            preservation_threshold: 0.8,
            engine_timeout: Some(Duration::from_secs(90)),
        }
    }
}

/// Errors surfaced to the caller; engine-side problems never are
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Per-stage record kept for logs and reports
#[derive(Debug, Clone, Serialize)]
pub struct StageSummary {
    pub stage: StageKind,
    pub utterances: usize,
    pub outcome: StageOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preservation_rate: Option<f64>,
}

impl From<&StageResult> for StageSummary {
    fn from(result: &StageResult) -> Self {
        Self {
            stage: result.stage,
            utterances: result.sequence.len(),
            outcome: result.outcome.clone(),
            preservation_rate: result.preservation_rate,
        }
    }
}

/// Result of a full pipeline run
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// Final stage output, in the order the engine produced it
    pub transcript: UtteranceSequence,
    /// Length of the raw input in characters
    pub original_length: usize,
    /// Number of utterances in the final transcript
    pub formatted_length: usize,
    pub stages: Vec<StageSummary>,
    /// Stage 1 text preservation rate
    pub preservation_rate: Option<f64>,
}

impl PipelineResult {
    /// Number of stages that had to fall back
    pub fn fallback_count(&self) -> usize {
        self.stages.iter().filter(|s| s.outcome.is_fallback()).count()
    }
}

/// Run the three-stage segmentation pipeline
///
/// 1. initial_parsing on the raw text
/// 2. refinement on the serialized stage 1 sequence
/// 3. final_polish on the serialized stage 2 sequence
///
/// Exactly one engine call per stage. Only blank input is an error; every
/// engine-side failure is absorbed by the epoch fallback.
pub async fn run_pipeline(
    engine: &dyn TransformEngine,
    full_text: &str,
    speaker_hint: Option<&str>,
    config: &PipelineConfig,
) -> Result<PipelineResult, PipelineError> {
    if full_text.trim().is_empty() {
        return Err(PipelineError::InvalidInput(
            "fullText must be a non-empty string".to_string(),
        ));
    }

    let original_length = full_text.chars().count();
    info!(
        "Segmenting transcript: {} chars, {} words",
        original_length,
        full_text.split_whitespace().count()
    );

    let mut stages = Vec::with_capacity(StageKind::ALL.len());
    let mut preservation_rate = None;
    let mut input = full_text.to_string();
    let mut sequence = UtteranceSequence::new();

    for stage in StageKind::ALL {
        let request = EpochRequest {
            input: &input,
            speaker_hint,
            stage,
        };
        let result = execute_epoch(engine, &request, config).await;

        if result.preservation_rate.is_some() {
            preservation_rate = result.preservation_rate;
        }
        stages.push(StageSummary::from(&result));
        sequence = result.sequence;

        if stage != StageKind::FinalPolish {
            input = serialize_sequence(&sequence);
        }
    }

    let summary = PipelineResult {
        formatted_length: sequence.len(),
        transcript: sequence,
        original_length,
        stages,
        preservation_rate,
    };

    if summary.fallback_count() > 0 {
        warn!(
            "Pipeline finished with {} of {} stages on fallback",
            summary.fallback_count(),
            summary.stages.len()
        );
    }
    info!(
        "Pipeline complete: {} chars -> {} utterances",
        summary.original_length, summary.formatted_length
    );

    Ok(summary)
}

/// Structured-text form handed to the next stage
pub fn serialize_sequence(sequence: &UtteranceSequence) -> String {
    // Serializing plain strings, bools and RFC 3339 timestamps cannot fail
    serde_json::to_string_pretty(sequence).unwrap_or_else(|_| "[]".to_string())
}
