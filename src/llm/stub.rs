//! In-memory engines for tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use super::TransformEngine;

/// Scripted reply for one call
pub enum Reply {
    Text(String),
    Fail(String),
    /// Sleep before answering, to exercise timeouts
    Slow(Duration, String),
}

/// Returns queued replies in order and records every prompt it receives.
/// When the queue runs dry it keeps returning `default`.
pub struct ScriptedEngine {
    replies: Mutex<VecDeque<Reply>>,
    default: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedEngine {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            default: "not json".to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always answers with the same text
    pub fn always(text: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            default: text.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl TransformEngine for ScriptedEngine {
    async fn transform(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let reply = self.replies.lock().unwrap().pop_front();

        match reply {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Fail(message)) => Err(anyhow::anyhow!(message)),
            Some(Reply::Slow(delay, text)) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            None => Ok(self.default.clone()),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
