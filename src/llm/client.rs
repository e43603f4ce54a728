use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_API_BASE: &str = "https://api.anthropic.com";

/// Black-box text transformation: instruction in, free text out.
///
/// Output is not guaranteed to be deterministic or well-formed; callers
/// are expected to validate it.
#[async_trait]
pub trait TransformEngine: Send + Sync {
    async fn transform(&self, prompt: &str) -> Result<String>;

    /// Human-readable engine name for logs
    fn name(&self) -> &str;
}

/// Configuration for the Anthropic API client
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// API key (from ANTHROPIC_API_KEY env var)
    pub api_key: String,
    /// Model to use (e.g., "claude-sonnet-4-20250514")
    pub model: String,
    /// Base URL of the Messages API
    pub api_base: String,
    /// Temperature (0-1, lower = more deterministic)
    pub temperature: f64,
    /// Maximum tokens in response
    pub max_tokens: u32,
}

impl AnthropicConfig {
    /// Create config from environment variables.
    ///
    /// Read once at startup; the resulting value is passed to the client.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .context("ANTHROPIC_API_KEY environment variable not set")?;

        let mut config = Self::new(api_key, DEFAULT_MODEL.to_string());
        if let Ok(model) = std::env::var("TURNSPLIT_MODEL") {
            config.model = model;
        }
        if let Ok(api_base) = std::env::var("TURNSPLIT_API_BASE") {
            config.api_base = api_base;
        }
        Ok(config)
    }

    /// Create with custom settings
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            api_base: DEFAULT_API_BASE.to_string(),
            temperature: 0.1,
            max_tokens: 4096,
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.api_base.trim_end_matches('/'))
    }
}

/// Anthropic API client
pub struct AnthropicClient {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicClient {
    pub fn new(config: AnthropicConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &AnthropicConfig {
        &self.config
    }

    /// Send a single user message and return the first text block
    pub async fn send_message(&self, user: &str) -> Result<String> {
        let request = AnthropicRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: Some(self.config.temperature),
            messages: vec![Message {
                role: "user".to_string(),
                content: user.to_string(),
            }],
        };

        let response = self
            .client
            .post(self.config.messages_url())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Anthropic API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Anthropic API error: {} - {}", status, body);
        }

        let response: AnthropicResponse = response
            .json()
            .await
            .context("Failed to parse Anthropic API response")?;

        response.first_text().context("No text content in response")
    }
}

#[async_trait]
impl TransformEngine for AnthropicClient {
    async fn transform(&self, prompt: &str) -> Result<String> {
        self.send_message(prompt).await
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

impl AnthropicResponse {
    fn first_text(&self) -> Option<String> {
        self.content
            .iter()
            .find(|c| c.content_type == "text")
            .map(|c| c.text.clone())
    }
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = AnthropicConfig::new("key".to_string(), "model-x".to_string());
        assert_eq!(config.temperature, 0.1);
        assert_eq!(config.max_tokens, 4096);
        assert_eq!(config.messages_url(), "https://api.anthropic.com/v1/messages");
    }

    #[test]
    fn test_messages_url_trims_slash() {
        let mut config = AnthropicConfig::new("key".to_string(), "model-x".to_string());
        config.api_base = "http://localhost:8080/".to_string();
        assert_eq!(config.messages_url(), "http://localhost:8080/v1/messages");
    }

    #[test]
    fn test_request_shape() {
        let request = AnthropicRequest {
            model: "model-x".to_string(),
            max_tokens: 4096,
            temperature: Some(0.1),
            messages: vec![Message {
                role: "user".to_string(),
                content: "split this".to_string(),
            }],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "split this");
        assert!(value.get("system").is_none());
    }

    #[test]
    fn test_first_text_skips_non_text_blocks() {
        let json = r#"{"content": [
            {"type": "thinking"},
            {"type": "text", "text": "[]"}
        ]}"#;
        let response: AnthropicResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.first_text().as_deref(), Some("[]"));

        let empty: AnthropicResponse = serde_json::from_str(r#"{"content": []}"#).unwrap();
        assert!(empty.first_text().is_none());
    }
}
