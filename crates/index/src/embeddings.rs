use async_trait::async_trait;
use extract::LlmError;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmbedOptions {
    /// Truncate vectors to this many dimensions.
    pub dimensions: Option<usize>,
    /// Scale vectors to unit length.
    pub normalize: bool,
}

/// Text embedding capability.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String], options: &EmbedOptions)
    -> Result<Vec<Vec<f32>>, LlmError>;
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct OllamaEmbedder {
    config: EmbeddingConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(
        &self,
        texts: &[String],
        options: &EmbedOptions,
    ) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/api/embed", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .json(&EmbedRequest {
                model: &self.config.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "embedding request failed");
            return Err(LlmError::Status(response.status().as_u16()));
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;

        if body.embeddings.len() != texts.len() {
            return Err(LlmError::Decode(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                body.embeddings.len()
            )));
        }

        Ok(body
            .embeddings
            .into_iter()
            .map(|v| shape_vector(v, options))
            .collect())
    }
}

pub fn shape_vector(mut vector: Vec<f32>, options: &EmbedOptions) -> Vec<f32> {
    if let Some(dimensions) = options.dimensions {
        vector.truncate(dimensions);
    }
    if options.normalize {
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
    }
    vector
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_then_normalizes() {
        let options = EmbedOptions {
            dimensions: Some(2),
            normalize: true,
        };
        let v = shape_vector(vec![3.0, 4.0, 12.0], &options);
        assert_eq!(v, vec![0.6, 0.8]);
    }

    #[test]
    fn zero_vectors_stay_zero() {
        let options = EmbedOptions {
            dimensions: None,
            normalize: true,
        };
        assert_eq!(shape_vector(vec![0.0, 0.0], &options), vec![0.0, 0.0]);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn cosine_of_parallel_vectors_is_one() {
        let sim = cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]);
        assert!((sim - 1.0).abs() < 1e-6);
    }
}
