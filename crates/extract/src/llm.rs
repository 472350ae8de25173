use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("language model unavailable: {0}")]
    Unavailable(String),

    #[error("language model request failed: {0}")]
    Request(String),

    #[error("language model returned status {0}")]
    Status(u16),

    #[error("could not read language model response: {0}")]
    Decode(String),

    #[error("language model returned no text")]
    Empty,

    #[error("language model call timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerateOptions {
    /// Overrides the client's default model when set.
    pub model_id: Option<String>,
    pub temperature: f32,
    /// Ask the backend to constrain output to JSON, where supported.
    pub json: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            model_id: None,
            temperature: 0.0,
            json: false,
        }
    }
}

impl GenerateOptions {
    pub fn json() -> Self {
        Self {
            json: true,
            ..Self::default()
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Text generation capability. Implementations always hand back plain text;
/// provider response shapes are unwrapped by [`normalize_response`].
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String, LlmError>;
}

#[async_trait]
impl<T: LanguageModel + ?Sized> LanguageModel for Arc<T> {
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String, LlmError> {
        (**self).generate(prompt, options).await
    }
}

/// Run one generation, turning an elapsed deadline into [`LlmError::Timeout`].
pub async fn generate_with_timeout(
    model: &dyn LanguageModel,
    prompt: &str,
    options: &GenerateOptions,
    timeout: Option<Duration>,
) -> Result<String, LlmError> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, model.generate(prompt, options))
            .await
            .map_err(|_| LlmError::Timeout(limit))?,
        None => model.generate(prompt, options).await,
    }
}

/// Pull the generated text out of a provider response body.
///
/// Handles bare strings, `{"response"}` (Ollama generate), `{"text"}`,
/// `{"content"}` as a string or as a list of content blocks,
/// `{"message": {"content"}}` (chat) and `{"choices": [...]}` (OpenAI style).
pub fn normalize_response(body: &Value) -> Option<String> {
    match body {
        Value::String(text) => Some(text.clone()),
        Value::Array(blocks) => {
            let parts: Vec<String> = blocks.iter().filter_map(normalize_response).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.concat())
            }
        }
        Value::Object(map) => {
            for key in ["response", "text", "content", "output"] {
                if let Some(text) = map.get(key).and_then(normalize_response) {
                    return Some(text);
                }
            }
            if let Some(text) = map.get("message").and_then(normalize_response) {
                return Some(text);
            }
            map.get("choices")
                .and_then(Value::as_array)
                .and_then(|choices| choices.first())
                .and_then(normalize_response)
        }
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct OllamaClient {
    config: OllamaConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Build a client and confirm the backend answers. Availability is
    /// checked here once, not on every call.
    pub async fn connect(config: OllamaConfig) -> Result<Self, LlmError> {
        let client = Self::new(config);
        client.check_available().await?;
        Ok(client)
    }

    pub async fn check_available(&self) -> Result<(), LlmError> {
        let url = format!("{}/api/tags", self.config.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| LlmError::Unavailable(format!("{}: {}", self.config.base_url, e)))?;

        if !response.status().is_success() {
            return Err(LlmError::Unavailable(format!(
                "{} answered {}",
                self.config.base_url,
                response.status()
            )));
        }

        Ok(())
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.config.base_url);

        let request = OllamaRequest {
            model: options.model_id.as_deref().unwrap_or(&self.config.model),
            prompt,
            stream: false,
            format: options.json.then_some("json"),
            options: OllamaOptions {
                temperature: options.temperature,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "Ollama request failed");
            return Err(LlmError::Status(response.status().as_u16()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;

        let text = normalize_response(&body)
            .ok_or_else(|| LlmError::Decode("no text in Ollama response".to_string()))?;
        if text.trim().is_empty() {
            return Err(LlmError::Empty);
        }
        debug!(chars = text.len(), "generated");

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_provider_shapes() {
        assert_eq!(normalize_response(&json!("plain")), Some("plain".into()));
        assert_eq!(
            normalize_response(&json!({"response": "ollama", "done": true})),
            Some("ollama".into())
        );
        assert_eq!(
            normalize_response(&json!({"message": {"role": "assistant", "content": "chat"}})),
            Some("chat".into())
        );
        assert_eq!(
            normalize_response(&json!({"choices": [{"message": {"content": "openai"}}]})),
            Some("openai".into())
        );
        assert_eq!(
            normalize_response(&json!({"content": [{"type": "text", "text": "a"}, {"type": "text", "text": "b"}]})),
            Some("ab".into())
        );
        assert_eq!(normalize_response(&json!({"done": true})), None);
    }

    struct Slow;

    #[async_trait]
    impl LanguageModel for Slow {
        async fn generate(&self, _: &str, _: &GenerateOptions) -> Result<String, LlmError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".into())
        }
    }

    #[tokio::test]
    async fn timeout_is_reported_as_error() {
        let limit = Duration::from_millis(50);
        let err = generate_with_timeout(&Slow, "p", &GenerateOptions::default(), Some(limit))
            .await
            .unwrap_err();
        assert_eq!(err, LlmError::Timeout(limit));
    }
}
