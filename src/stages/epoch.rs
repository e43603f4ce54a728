use chrono::Utc;
use tracing::{debug, info, warn};

use crate::llm::{build_instruction, parse_utterances, preservation_rate, ParseOutcome, TransformEngine};
use crate::models::{StageKind, StageOutcome, StageResult, Utterance};

use super::PipelineConfig;

/// Input to one epoch
#[derive(Debug, Clone)]
pub struct EpochRequest<'a> {
    /// Raw text for stage 1, a serialized sequence for stages 2 and 3
    pub input: &'a str,
    /// Name for the non-tutor speaker
    pub speaker_hint: Option<&'a str>,
    pub stage: StageKind,
}

/// Execute one epoch of the pipeline
///
/// 1. Build the stage instruction from the template
/// 2. Call the engine once, bounded by the configured timeout
/// 3. Parse the reply; on any failure fall back (see [`fall_back`])
/// 4. Stage 1 only: score text preservation and warn when it is low
///
/// Never fails and never returns an empty sequence.
pub async fn execute_epoch(
    engine: &dyn TransformEngine,
    request: &EpochRequest<'_>,
    config: &PipelineConfig,
) -> StageResult {
    let stage = request.stage;
    let prompt = build_instruction(stage, request.input, request.speaker_hint);
    debug!("{}: sending {} chars to {}", stage, prompt.len(), engine.name());

    let base_time = Utc::now();
    let reply = call_engine(engine, &prompt, config).await;

    let (sequence, outcome) = match reply {
        Ok(text) => match parse_utterances(&text, base_time) {
            ParseOutcome::Parsed(sequence) => (sequence, StageOutcome::Parsed),
            ParseOutcome::ParseFailed(failure) => {
                warn!("{}: unparseable engine output: {}", stage, failure);
                fall_back(request, failure.to_string())
            }
        },
        Err(e) => {
            warn!("{}: engine call failed: {}", stage, e);
            fall_back(request, e)
        }
    };

    let preservation_rate = stage.checks_preservation().then(|| {
        let rate = preservation_rate(request.input, &sequence);
        if rate < config.preservation_threshold {
            warn!(
                "{}: low text preservation rate {:.3} (threshold {:.2})",
                stage, rate, config.preservation_threshold
            );
        } else {
            debug!("{}: text preservation rate {:.3}", stage, rate);
        }
        rate
    });

    info!("{}: {} utterances", stage, sequence.len());

    StageResult {
        stage,
        sequence,
        outcome,
        preservation_rate,
    }
}

async fn call_engine(
    engine: &dyn TransformEngine,
    prompt: &str,
    config: &PipelineConfig,
) -> Result<String, String> {
    let call = engine.transform(prompt);

    let result = match config.engine_timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => return Err(format!("timed out after {}ms", limit.as_millis())),
        },
        None => call.await,
    };

    result.map_err(|e| format!("{:#}", e))
}

/// Degrade without failing.
///
/// Stage 1 wraps the raw input in a single tutor utterance. Later stages
/// first try to reuse their (already structured) input, and only wrap it
/// verbatim if that does not parse either.
fn fall_back(request: &EpochRequest<'_>, reason: String) -> (Vec<Utterance>, StageOutcome) {
    if !request.stage.takes_raw_text() {
        match parse_utterances(request.input, Utc::now()) {
            ParseOutcome::Parsed(sequence) => {
                info!("{}: reusing previous stage output", request.stage);
                return (sequence, StageOutcome::ReusedInput { reason });
            }
            ParseOutcome::ParseFailed(failure) => {
                warn!("{}: stage input unparseable too: {}", request.stage, failure);
            }
        }
    }

    (
        vec![Utterance::fallback(request.input)],
        StageOutcome::RawFallback { reason },
    )
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::llm::stub::{Reply, ScriptedEngine};
    use crate::models::Speaker;

    const SPLIT_REPLY: &str = r#"[
        {"text": "Hi there how are you", "isUser": true},
        {"text": "I am fine thanks", "isUser": false}
    ]"#;

    fn request(stage: StageKind, input: &str) -> EpochRequest<'_> {
        EpochRequest {
            input,
            speaker_hint: Some("Sam"),
            stage,
        }
    }

    #[tokio::test]
    async fn test_stage1_parsed_with_preservation() {
        let engine = ScriptedEngine::always(SPLIT_REPLY);
        let input = "Hi there how are you I am fine thanks";

        let result = execute_epoch(
            &engine,
            &request(StageKind::InitialParsing, input),
            &PipelineConfig::default(),
        )
        .await;

        assert_eq!(result.outcome, StageOutcome::Parsed);
        assert_eq!(result.sequence.len(), 2);
        assert_eq!(result.preservation_rate, Some(1.0));
        assert_eq!(engine.call_count(), 1);
        assert!(engine.prompts()[0].contains("Sam is speaker B"));
    }

    #[tokio::test]
    async fn test_low_preservation_is_not_a_gate() {
        let engine = ScriptedEngine::always(r#"[{"text": "something else entirely", "isUser": true}]"#);

        let result = execute_epoch(
            &engine,
            &request(StageKind::InitialParsing, "hi there how are you"),
            &PipelineConfig::default(),
        )
        .await;

        assert_eq!(result.outcome, StageOutcome::Parsed);
        assert_eq!(result.sequence[0].text, "something else entirely");
        assert_eq!(result.preservation_rate, Some(0.0));
        assert_eq!(engine.call_count(), 1);
    }

    #[tokio::test]
    async fn test_stage1_garbage_falls_back_to_raw() {
        let engine = ScriptedEngine::always("Sorry, I can't help with that.");
        let input = "hello   there\nhow are you";

        let result = execute_epoch(
            &engine,
            &request(StageKind::InitialParsing, input),
            &PipelineConfig::default(),
        )
        .await;

        assert!(matches!(result.outcome, StageOutcome::RawFallback { .. }));
        assert_eq!(result.sequence.len(), 1);
        assert_eq!(result.sequence[0].text, input);
        assert_eq!(result.sequence[0].speaker(), Speaker::Tutor);
        assert_eq!(result.preservation_rate, Some(1.0));
    }

    #[tokio::test]
    async fn test_later_stage_reuses_structured_input() {
        let engine = ScriptedEngine::new(vec![Reply::Fail("503 Service Unavailable".to_string())]);

        let result = execute_epoch(
            &engine,
            &request(StageKind::Refinement, SPLIT_REPLY),
            &PipelineConfig::default(),
        )
        .await;

        match &result.outcome {
            StageOutcome::ReusedInput { reason } => assert!(reason.contains("503")),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(result.sequence.len(), 2);
        assert_eq!(result.sequence[1].text, "I am fine thanks");
        assert_eq!(result.preservation_rate, None);
    }

    #[tokio::test]
    async fn test_later_stage_with_unstructured_input_wraps_it() {
        let engine = ScriptedEngine::always("nope");

        let result = execute_epoch(
            &engine,
            &request(StageKind::FinalPolish, "not a sequence"),
            &PipelineConfig::default(),
        )
        .await;

        assert!(matches!(result.outcome, StageOutcome::RawFallback { .. }));
        assert_eq!(result.sequence.len(), 1);
        assert_eq!(result.sequence[0].text, "not a sequence");
        assert!(result.sequence[0].is_user);
    }

    #[tokio::test]
    async fn test_timeout_triggers_fallback() {
        let engine = ScriptedEngine::new(vec![Reply::Slow(
            Duration::from_millis(500),
            SPLIT_REPLY.to_string(),
        )]);
        let config = PipelineConfig {
            engine_timeout: Some(Duration::from_millis(20)),
            ..Default::default()
        };

        let result = execute_epoch(
            &engine,
            &request(StageKind::InitialParsing, "Hi there how are you I am fine thanks"),
            &config,
        )
        .await;

        match &result.outcome {
            StageOutcome::RawFallback { reason } => assert!(reason.contains("timed out")),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(result.sequence.len(), 1);
    }
}
