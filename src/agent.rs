//! LLM agent module for document summarization.
//!
//! The lifecycle only sees the [`Summarizer`] trait. Two providers are
//! available: an OpenRouter chat-completions client over reqwest and a Gemini
//! client via rstructor.

use crate::config::{Config, ConfigError};
use crate::document::FileType;
use crate::extract::{self, ExtractError};
use async_trait::async_trait;
use reqwest::Client;
use rstructor::{GeminiClient, GeminiModel, LLMClient};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// User-Agent string identifying this client
const USER_AGENT: &str = concat!("summadoc/", env!("CARGO_PKG_VERSION"));

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM request failed: {0}")]
    RequestFailed(String),
    #[error("failed to parse response: {0}")]
    ParseError(String),
    #[error("model returned an empty summary")]
    EmptySummary,
    #[error("could not read document: {0}")]
    Extraction(#[from] ExtractError),
    #[error("configuration error: {0}")]
    ConfigError(#[from] ConfigError),
}

/// Summarization capability consumed by the lifecycle controller.
///
/// Implementations may be slow and may fail; callers bound them with a timeout.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, content: &[u8], file_type: FileType) -> Result<String, AgentError>;
}

/// Build the summarizer named by `[agent] provider`
pub fn from_config(config: &Config) -> Result<Arc<dyn Summarizer>, AgentError> {
    let api_key = config.api_key()?.to_string();
    match config.agent.provider.as_str() {
        "openrouter" => Ok(Arc::new(OpenRouterSummarizer::new(config, api_key)?)),
        "gemini" => Ok(Arc::new(GeminiSummarizer::new(config, api_key))),
        other => Err(ConfigError::UnknownProvider(other.to_string()).into()),
    }
}

/// Build the user prompt from the instruction and the extracted text
fn build_prompt(instruction: &str, text: &str) -> String {
    format!("{} {}", instruction.trim_end(), text)
}

/// Run text extraction on the blocking pool. PDF and docx parsing is
/// CPU-bound and must not hold a runtime worker.
async fn extract_blocking(content: &[u8], file_type: FileType) -> Result<String, AgentError> {
    let bytes = content.to_vec();
    let text = tokio::task::spawn_blocking(move || extract::extract_text(&bytes, file_type))
        .await
        .map_err(|e| AgentError::RequestFailed(format!("extraction task failed: {}", e)))??;
    Ok(text)
}

fn non_empty(text: &str) -> Result<String, AgentError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AgentError::EmptySummary);
    }
    Ok(trimmed.to_string())
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// OpenRouter (OpenAI-compatible) chat-completions summarizer
pub struct OpenRouterSummarizer {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    persona: String,
    prompt: String,
}

impl OpenRouterSummarizer {
    pub fn new(config: &Config, api_key: String) -> Result<Self, AgentError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AgentError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.agent.api_url.trim_end_matches('/')),
            api_key,
            model: config.agent.model.clone(),
            persona: config.agent.persona.clone(),
            prompt: config.agent.prompt.clone(),
        })
    }
}

#[async_trait]
impl Summarizer for OpenRouterSummarizer {
    async fn summarize(&self, content: &[u8], file_type: FileType) -> Result<String, AgentError> {
        let text = extract_blocking(content, file_type).await?;
        let prompt = build_prompt(&self.prompt, &text);

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &self.persona,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("X-Title", "Document Summarizer")
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AgentError::RequestFailed(e.to_string()))?;
        if !status.is_success() {
            return Err(AgentError::RequestFailed(format!("HTTP {}: {}", status, body)));
        }

        parse_chat_response(&body)
    }
}

/// Pull the first choice's message content out of a chat-completions body
fn parse_chat_response(body: &str) -> Result<String, AgentError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| AgentError::ParseError(format!("{}: {}", e, body)))?;

    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| AgentError::ParseError(format!("no choices in response: {}", body)))?;

    non_empty(&content)
}

/// Gemini summarizer using rstructor
pub struct GeminiSummarizer {
    api_key: String,
    model: String,
    persona: String,
    prompt: String,
}

impl GeminiSummarizer {
    pub fn new(config: &Config, api_key: String) -> Self {
        Self {
            api_key,
            model: config.agent.model.clone(),
            persona: config.agent.persona.clone(),
            prompt: config.agent.prompt.clone(),
        }
    }
}

#[async_trait]
impl Summarizer for GeminiSummarizer {
    async fn summarize(&self, content: &[u8], file_type: FileType) -> Result<String, AgentError> {
        let text = extract_blocking(content, file_type).await?;

        let client = GeminiClient::new(self.api_key.clone())
            .map_err(|e| AgentError::RequestFailed(e.to_string()))?
            .model(parse_gemini_model(&self.model));

        let prompt = format!("{}\n\n{}", self.persona, build_prompt(&self.prompt, &text));
        let result = client
            .generate_with_metadata(&prompt)
            .await
            .map_err(|e| AgentError::RequestFailed(e.to_string()))?;

        non_empty(&result.text)
    }
}

/// Parse a model string into a GeminiModel
fn parse_gemini_model(model: &str) -> GeminiModel {
    match model {
        "gemini-2.0-flash" => GeminiModel::Gemini20Flash,
        "gemini-2.5-flash" => GeminiModel::Gemini25Flash,
        "gemini-2.5-pro" => GeminiModel::Gemini25Pro,
        _ => GeminiModel::Gemini20Flash, // Default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_response_yields_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"  Revenue rose.\n"}}]}"#;
        assert_eq!(parse_chat_response(body).unwrap(), "Revenue rose.");
    }

    #[test]
    fn chat_response_without_choices_is_parse_error() {
        let result = parse_chat_response(r#"{"choices":[]}"#);
        assert!(matches!(result, Err(AgentError::ParseError(_))));

        let result = parse_chat_response("<html>bad gateway</html>");
        assert!(matches!(result, Err(AgentError::ParseError(_))));
    }

    #[test]
    fn blank_content_is_empty_summary() {
        let body = r#"{"choices":[{"message":{"content":"   "}}]}"#;
        assert!(matches!(
            parse_chat_response(body),
            Err(AgentError::EmptySummary)
        ));
    }

    #[test]
    fn prompt_places_text_after_instruction() {
        let prompt = build_prompt("Summarize this: ", "Revenue grew 10%.");
        assert_eq!(prompt, "Summarize this: Revenue grew 10%.");
    }

    #[tokio::test]
    async fn extraction_runs_off_the_runtime_and_reports_bad_input() {
        let text = extract_blocking(b"Revenue grew 10%.", FileType::Txt).await.unwrap();
        assert_eq!(text, "Revenue grew 10%.");

        let result = extract_blocking(&[0xff, 0xfe, 0x00], FileType::Txt).await;
        assert!(matches!(result, Err(AgentError::Extraction(_))));
    }

    #[test]
    fn missing_key_fails_provider_construction() {
        let config = Config::default();
        let result = from_config(&config);
        assert!(matches!(
            result,
            Err(AgentError::ConfigError(ConfigError::MissingApiKey(_)))
        ));
    }
}
