use std::fmt;

use serde::{Deserialize, Serialize};

use super::UtteranceSequence;

/// The three passes of the segmentation pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Stage 1: split raw text by speaker change
    InitialParsing,
    /// Stage 2: re-split the stage 1 output
    Refinement,
    /// Stage 3: final polish of the stage 2 output
    FinalPolish,
}

impl StageKind {
    /// Pipeline order
    pub const ALL: [StageKind; 3] = [
        StageKind::InitialParsing,
        StageKind::Refinement,
        StageKind::FinalPolish,
    ];

    pub fn number(self) -> u8 {
        match self {
            StageKind::InitialParsing => 1,
            StageKind::Refinement => 2,
            StageKind::FinalPolish => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StageKind::InitialParsing => "initial_parsing",
            StageKind::Refinement => "refinement",
            StageKind::FinalPolish => "final_polish",
        }
    }

    /// Only stage 1 sees free text, so only stage 1 is scored for word preservation
    pub fn checks_preservation(self) -> bool {
        matches!(self, StageKind::InitialParsing)
    }

    /// Whether the stage input is raw text rather than a serialized sequence
    pub fn takes_raw_text(self) -> bool {
        matches!(self, StageKind::InitialParsing)
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage {} ({})", self.number(), self.as_str())
    }
}

/// How a stage arrived at its sequence
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageOutcome {
    /// The engine reply parsed into a well-formed sequence
    Parsed,
    /// The engine reply was unusable; the stage input was parsed instead
    ReusedInput { reason: String },
    /// Nothing parsed; the whole stage input became a single tutor utterance
    RawFallback { reason: String },
}

impl StageOutcome {
    pub fn is_fallback(&self) -> bool {
        !matches!(self, StageOutcome::Parsed)
    }
}

/// Output of one epoch; transient, passed by value to the next stage
#[derive(Debug, Clone)]
pub struct StageResult {
    pub stage: StageKind,
    /// Never empty
    pub sequence: UtteranceSequence,
    pub outcome: StageOutcome,
    /// Set for stages that check preservation
    pub preservation_rate: Option<f64>,
}
