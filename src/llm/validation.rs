use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::models::{Utterance, UtteranceSequence};

/// Why an engine reply could not be read as an utterance sequence
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseFailure {
    #[error("no JSON array found in response")]
    NoJsonArray,
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
    #[error("sequence is empty")]
    EmptySequence,
    #[error("record {index} is invalid: {reason}")]
    InvalidRecord { index: usize, reason: String },
}

/// Tagged result of parsing an engine reply
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Parsed(UtteranceSequence),
    ParseFailed(ParseFailure),
}

impl ParseOutcome {
    pub fn into_result(self) -> Result<UtteranceSequence, ParseFailure> {
        match self {
            ParseOutcome::Parsed(sequence) => Ok(sequence),
            ParseOutcome::ParseFailed(failure) => Err(failure),
        }
    }
}

/// Parse an engine reply into a non-empty utterance sequence.
///
/// Accepts a bare array, a fenced array, or an array embedded in prose.
/// Every record needs a non-blank string `text` and a boolean `isUser`.
/// IDs are always regenerated; a record's RFC 3339 `timestamp` is kept,
/// otherwise `base_time + index` seconds is used.
pub fn parse_utterances(raw: &str, base_time: DateTime<Utc>) -> ParseOutcome {
    match parse_records(raw, base_time) {
        Ok(sequence) => ParseOutcome::Parsed(sequence),
        Err(failure) => ParseOutcome::ParseFailed(failure),
    }
}

fn parse_records(raw: &str, base_time: DateTime<Utc>) -> Result<UtteranceSequence, ParseFailure> {
    let records = extract_json_array(raw)?;
    if records.is_empty() {
        return Err(ParseFailure::EmptySequence);
    }

    records
        .iter()
        .enumerate()
        .map(|(index, record)| parse_record(index, record, base_time))
        .collect()
}

fn parse_record(
    index: usize,
    record: &Value,
    base_time: DateTime<Utc>,
) -> Result<Utterance, ParseFailure> {
    let invalid = |reason: &str| ParseFailure::InvalidRecord {
        index,
        reason: reason.to_string(),
    };

    let object = record.as_object().ok_or_else(|| invalid("not an object"))?;

    let text = object
        .get("text")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("missing string field `text`"))?;
    if text.trim().is_empty() {
        return Err(invalid("`text` is blank"));
    }

    let is_user = object
        .get("isUser")
        .and_then(Value::as_bool)
        .ok_or_else(|| invalid("missing boolean field `isUser`"))?;

    let timestamp = object
        .get("timestamp")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|| base_time + Duration::seconds(index as i64));

    Ok(Utterance {
        id: uuid::Uuid::new_v4().to_string(),
        text: text.to_string(),
        is_user,
        timestamp,
    })
}

/// Locate the JSON array in a reply that may carry a code fence or prose.
///
/// Tries every `[` in order and reads a single JSON value from it, so text
/// after the closing `]` is ignored. The first array of objects wins; bracketed
/// prose such as `[2]` is skipped. If no array of objects is found, the first
/// array seen is returned so record validation can name the problem.
fn extract_json_array(raw: &str) -> Result<Vec<Value>, ParseFailure> {
    let mut first_array = None;
    let mut first_error = None;

    for (start, _) in raw.match_indices('[') {
        let mut values = serde_json::Deserializer::from_str(&raw[start..]).into_iter::<Value>();
        match values.next() {
            Some(Ok(Value::Array(items))) => {
                if !items.is_empty() && items.iter().all(Value::is_object) {
                    return Ok(items);
                }
                if first_array.is_none() {
                    first_array = Some(items);
                }
            }
            Some(Err(e)) if first_error.is_none() => first_error = Some(e.to_string()),
            _ => {}
        }
    }

    match (first_array, first_error) {
        (Some(items), _) => Ok(items),
        (None, Some(error)) => Err(ParseFailure::InvalidJson(error)),
        (None, None) => Err(ParseFailure::NoJsonArray),
    }
}

/// Whitespace tokens, lower-cased
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Fraction of original tokens that appear anywhere in the sequence text.
///
/// Original tokens count with multiplicity; result tokens by presence.
/// An original with no tokens is fully preserved.
pub fn preservation_rate(original: &str, sequence: &[Utterance]) -> f64 {
    let combined = sequence
        .iter()
        .map(|u| u.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    text_preservation_rate(original, &combined)
}

pub fn text_preservation_rate(original: &str, result: &str) -> f64 {
    let original_tokens = tokenize(original);
    if original_tokens.is_empty() {
        return 1.0;
    }

    let result_tokens: HashSet<String> = tokenize(result).into_iter().collect();
    let preserved = original_tokens
        .iter()
        .filter(|t| result_tokens.contains(*t))
        .count();

    preserved as f64 / original_tokens.len() as f64
}
