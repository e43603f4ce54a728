use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::models::UtteranceSequence;
use crate::stages::PipelineError;

/// Validated inbound request: `{ fullText, studentName? }`
#[derive(Debug, Clone, PartialEq)]
pub struct FormatRequest {
    pub full_text: String,
    pub student_name: Option<String>,
}

impl FormatRequest {
    /// Validate a raw JSON body.
    ///
    /// `fullText` must be a non-blank string. `studentName` may be absent
    /// or null; when present it must be a string, and a blank one is
    /// treated as absent.
    pub fn from_json(body: &Value) -> Result<Self, PipelineError> {
        let full_text = match body.get("fullText") {
            None | Some(Value::Null) => {
                return Err(PipelineError::InvalidInput(
                    "fullText is required".to_string(),
                ));
            }
            Some(Value::String(text)) => text,
            Some(_) => {
                return Err(PipelineError::InvalidInput(
                    "fullText must be a string".to_string(),
                ));
            }
        };

        if full_text.trim().is_empty() {
            return Err(PipelineError::InvalidInput(
                "fullText must be a non-empty string".to_string(),
            ));
        }

        let student_name = match body.get("studentName") {
            None | Some(Value::Null) => None,
            Some(Value::String(name)) => Some(name.trim().to_string()).filter(|n| !n.is_empty()),
            Some(_) => {
                return Err(PipelineError::InvalidInput(
                    "studentName must be a string".to_string(),
                ));
            }
        };

        Ok(Self {
            full_text: full_text.clone(),
            student_name,
        })
    }

    /// Length of `fullText` in characters, as reported in `originalLength`
    pub fn char_count(&self) -> usize {
        self.full_text.chars().count()
    }
}

/// Read a raw conversation text file
pub fn read_raw_text_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {:?}", path))
}

/// Read a transcript JSON file: either a bare utterance array or a
/// `{ "transcript": [...] }` response body
pub fn read_transcript_file(path: &Path) -> Result<UtteranceSequence> {
    let content = read_raw_text_file(path)?;
    parse_transcript_json(&content)
}

pub fn parse_transcript_json(json: &str) -> Result<UtteranceSequence> {
    let value: Value = serde_json::from_str(json).context("Failed to parse transcript JSON")?;
    let array = match value {
        Value::Object(mut map) => map
            .remove("transcript")
            .context("Transcript JSON object has no `transcript` field")?,
        other => other,
    };
    serde_json::from_value(array).context("Transcript is not a list of utterances")
}
