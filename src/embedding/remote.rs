use super::{Embedder, Embedding, EmbeddingError};
use crate::config::EmbeddingConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/embeddings";

/// OpenAI-compatible `/embeddings` endpoint.
pub struct RemoteEmbedder {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    dimension: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    /// Asks the endpoint to shorten vectors to the configured size.
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl RemoteEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            EmbeddingError::ConfigError("API key is required for remote embeddings".to_string())
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            api_url: config
                .api_url
                .clone()
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            api_key,
            model: config.model.clone(),
            dimension: config.dimension,
        })
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: vec![text],
            dimensions: self.dimension,
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| EmbeddingError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            error!("Embedding API responded with status code: {}", status);
            return Err(EmbeddingError::ResponseError(format!(
                "API responded with status code: {}",
                status
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::ResponseError(e.to_string()))?;

        let embedding = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::ResponseError("No embedding in response".to_string()))?;

        if embedding.len() != self.dimension {
            return Err(EmbeddingError::ResponseError(format!(
                "Embedding dimension {} doesn't match configured dimension {}",
                embedding.len(),
                self.dimension
            )));
        }

        debug!("Embedded {} chars with {}", text.len(), self.model);
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "remote"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_carries_configured_dimensions() {
        let request = EmbeddingRequest {
            model: "text-embedding-3-small",
            input: vec!["table: users"],
            dimensions: 256,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "text-embedding-3-small");
        assert_eq!(value["input"][0], "table: users");
        assert_eq!(value["dimensions"], 256);
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let mut config = crate::config::AppConfig::default().embedding;
        config.backend = "remote".to_string();
        config.api_key = None;
        assert!(matches!(
            RemoteEmbedder::new(&config),
            Err(EmbeddingError::ConfigError(_))
        ));
    }
}
