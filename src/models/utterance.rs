use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One speaker-labeled span of the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utterance {
    /// Unique identifier (UUID), regenerated by every stage
    pub id: String,
    /// Verbatim spoken content
    pub text: String,
    /// `true` for the tutor, `false` for the student
    pub is_user: bool,
    /// Display/ordering timestamp, synthesized when not recoverable
    pub timestamp: DateTime<Utc>,
}

/// Ordered list of utterances; insertion order is conversational order
pub type UtteranceSequence = Vec<Utterance>;

impl Utterance {
    pub fn new(text: impl Into<String>, speaker: Speaker, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            is_user: speaker.is_user(),
            timestamp,
        }
    }

    /// Single tutor utterance holding `text` unmodified, stamped now
    pub fn fallback(text: &str) -> Self {
        Self::new(text, Speaker::Tutor, Utc::now())
    }

    pub fn speaker(&self) -> Speaker {
        Speaker::from_is_user(self.is_user)
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// The two roles in a tutoring session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Speaker {
    /// Speaker A, the human practicing tutor
    Tutor,
    /// Speaker B, the virtual student
    Student,
}

impl Speaker {
    pub fn from_is_user(is_user: bool) -> Self {
        if is_user { Speaker::Tutor } else { Speaker::Student }
    }

    pub fn is_user(self) -> bool {
        matches!(self, Speaker::Tutor)
    }

    /// Display label, using the student's name when one is known
    pub fn label(self, student_name: Option<&str>) -> String {
        match self {
            Speaker::Tutor => "Tutor".to_string(),
            Speaker::Student => student_name.unwrap_or("Student").to_string(),
        }
    }
}
