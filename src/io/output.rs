use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::models::{Utterance, UtteranceSequence};
use crate::stages::{PipelineResult, StageSummary};

/// Success body: `{ success, transcript, originalLength, formattedLength }`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatResponse {
    pub success: bool,
    pub transcript: UtteranceSequence,
    pub original_length: usize,
    pub formatted_length: usize,
}

impl From<PipelineResult> for FormatResponse {
    fn from(result: PipelineResult) -> Self {
        Self {
            success: true,
            transcript: result.transcript,
            original_length: result.original_length,
            formatted_length: result.formatted_length,
        }
    }
}

/// Failure body: `{ success: false, error }`
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

/// CLI output: the response body plus a per-stage report
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatReport {
    #[serde(flatten)]
    pub response: FormatResponse,
    pub stages: Vec<StageSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preservation_rate: Option<f64>,
}

impl From<PipelineResult> for FormatReport {
    fn from(result: PipelineResult) -> Self {
        let stages = result.stages.clone();
        let preservation_rate = result.preservation_rate;
        Self {
            response: FormatResponse::from(result),
            stages,
            preservation_rate,
        }
    }
}

impl FormatReport {
    /// Write to a JSON file
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create file: {:?}", path))?;
        serde_json::to_writer_pretty(file, self).context("Failed to write JSON")?;
        Ok(())
    }
}

/// Human-readable transcript format
pub struct HumanTranscript<'a> {
    transcript: &'a [Utterance],
    student_name: Option<&'a str>,
}

impl<'a> HumanTranscript<'a> {
    pub fn new(transcript: &'a [Utterance], student_name: Option<&'a str>) -> Self {
        Self {
            transcript,
            student_name,
        }
    }

    /// One block per utterance, headed by its offset from the first one
    pub fn format(&self) -> String {
        let mut output = String::new();
        let start = self.transcript.first().map(|u| u.timestamp);

        for utterance in self.transcript {
            let offset_ms = start
                .map(|s| (utterance.timestamp - s).num_milliseconds().max(0) as u64)
                .unwrap_or(0);
            output.push_str(&format!(
                "[{}] {}:\n",
                format_offset(offset_ms),
                utterance.speaker().label(self.student_name)
            ));
            output.push_str(&wrap_text(&utterance.text, 80));
            output.push_str("\n\n");
        }

        output
    }

    /// Write to a text file
    pub fn write_file(&self, path: &Path) -> Result<()> {
        let mut file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create file: {:?}", path))?;
        write!(file, "{}", self.format())?;
        Ok(())
    }
}

/// Format milliseconds as HH:MM:SS
fn format_offset(ms: u64) -> String {
    let seconds = ms / 1000;
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

/// Wrap text at approximately the given width
fn wrap_text(text: &str, width: usize) -> String {
    let mut result = String::new();
    let mut line_len = 0;

    for word in text.split_whitespace() {
        if line_len + word.len() + 1 > width && line_len > 0 {
            result.push('\n');
            line_len = 0;
        }
        if line_len > 0 {
            result.push(' ');
            line_len += 1;
        }
        result.push_str(word);
        line_len += word.len();
    }

    result
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Utc};

    use super::*;
    use crate::models::{Speaker, StageKind, StageOutcome};

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
            + Duration::seconds(seconds)
    }

    fn result() -> PipelineResult {
        PipelineResult {
            transcript: vec![
                Utterance::new("Hi there how are you", Speaker::Tutor, at(0)),
                Utterance::new("I am fine thanks", Speaker::Student, at(65)),
            ],
            original_length: 37,
            formatted_length: 2,
            stages: vec![StageSummary {
                stage: StageKind::InitialParsing,
                utterances: 2,
                outcome: StageOutcome::Parsed,
                preservation_rate: Some(1.0),
            }],
            preservation_rate: Some(1.0),
        }
    }

    #[test]
    fn test_response_wire_shape() {
        let value = serde_json::to_value(FormatResponse::from(result())).unwrap();

        assert_eq!(value["success"], true);
        assert_eq!(value["originalLength"], 37);
        assert_eq!(value["formattedLength"], 2);
        assert_eq!(value["transcript"][1]["isUser"], false);
        assert!(value.get("stages").is_none());
    }

    #[test]
    fn test_report_flattens_response() {
        let value = serde_json::to_value(FormatReport::from(result())).unwrap();

        assert_eq!(value["success"], true);
        assert_eq!(value["formattedLength"], 2);
        assert_eq!(value["stages"][0]["stage"], "initial_parsing");
        assert_eq!(value["stages"][0]["outcome"]["kind"], "parsed");
        assert_eq!(value["preservationRate"], 1.0);
    }

    #[test]
    fn test_error_response() {
        let value = serde_json::to_value(ErrorResponse::new("fullText is required")).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "fullText is required");
    }

    #[test]
    fn test_human_transcript_format() {
        let result = result();
        let text = HumanTranscript::new(&result.transcript, Some("Sam")).format();

        assert_eq!(
            text,
            "[00:00:00] Tutor:\nHi there how are you\n\n[00:01:05] Sam:\nI am fine thanks\n\n"
        );
    }

    #[test]
    fn test_format_offset() {
        assert_eq!(format_offset(0), "00:00:00");
        assert_eq!(format_offset(1500), "00:00:01");
        assert_eq!(format_offset(65_000), "00:01:05");
        assert_eq!(format_offset(3_661_500), "01:01:01");
    }

    #[test]
    fn test_wrap_text() {
        let text = "This is a test of the text wrapping function that should wrap at 20 chars";
        let wrapped = wrap_text(text, 20);
        assert!(wrapped.lines().count() > 1);
        for line in wrapped.lines() {
            assert!(line.len() <= 20);
        }
    }
}
