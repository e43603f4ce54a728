use crate::models::StageKind;

/// Label used for the non-tutor speaker when no name is supplied
pub const DEFAULT_STUDENT_LABEL: &str = "the student";

/// Stage-specific framing; everything else in the instruction is shared
struct StageTemplate {
    /// "splitting", "re-splitting", "final-splitting"
    task: &'static str,
    /// Describes what the input block contains
    input_description: &'static str,
    /// Info string for the fenced input block
    input_language: &'static str,
}

impl StageTemplate {
    fn for_stage(stage: StageKind) -> Self {
        match stage {
            StageKind::InitialParsing => Self {
                task: "splitting",
                input_description: "The input is the raw, unpunctuated text of a spoken tutoring session. \
                     It has no speaker labels and no line breaks between turns.",
                input_language: "text",
            },
            StageKind::Refinement => Self {
                task: "re-splitting",
                input_description: "The input is a JSON array of utterances produced by a previous \
                     splitting pass. Some boundaries or speaker labels may be wrong.",
                input_language: "json",
            },
            StageKind::FinalPolish => Self {
                task: "final-splitting",
                input_description: "The input is a JSON array of utterances produced by a previous \
                     re-splitting pass. Correct any boundary or speaker label that is still wrong.",
                input_language: "json",
            },
        }
    }
}

/// Build the instruction sent to the engine for a stage.
///
/// Pure: identical arguments always produce identical text.
pub fn build_instruction(stage: StageKind, input: &str, speaker_hint: Option<&str>) -> String {
    let template = StageTemplate::for_stage(stage);
    let student = speaker_hint
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_STUDENT_LABEL);

    let mut prompt = String::new();

    prompt.push_str(&format!(
        "# Task: {} a tutoring conversation by speaker change\n\n",
        capitalize(template.task)
    ));
    prompt.push_str(&format!(
        "Your ONLY task is {} the conversation into utterances wherever the speaker changes. \
         Do not summarize, correct, translate, or rewrite anything.\n\n",
        template.task
    ));
    prompt.push_str(template.input_description);
    prompt.push_str("\n\n");

    prompt.push_str("## Speakers\n");
    prompt.push_str("- The tutor is speaker A: set \"isUser\": true\n");
    prompt.push_str(&format!(
        "- {} is speaker B: set \"isUser\": false\n\n",
        capitalize(student)
    ));

    prompt.push_str("## Rules\n");
    prompt.push_str("1. Preserve the source text EXACTLY. Every word must appear, in order, with no additions.\n");
    prompt.push_str("2. Every utterance has exactly one speaker.\n");
    prompt.push_str("3. The same speaker may talk twice in a row; do not force alternation.\n");
    prompt.push_str("4. Keep the conversational order.\n\n");

    prompt.push_str("## Output\n");
    prompt.push_str(
        "Respond with a JSON array and NOTHING else: no prose, no explanation, no markdown.\n",
    );
    prompt.push_str(
        "Each element: {\"text\": string, \"isUser\": boolean, \"timestamp\": ISO-8601 string}\n\n",
    );

    let fence = fence_for(input);
    prompt.push_str("## Input\n");
    prompt.push_str(&format!("{}{}\n", fence, template.input_language));
    prompt.push_str(input);
    prompt.push_str(&format!("\n{}\n", fence));

    prompt
}

/// Backtick fence longer than any backtick run inside `input`
fn fence_for(input: &str) -> String {
    let longest_run = input
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    "`".repeat(longest_run.max(2) + 1)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
