pub mod providers;

use crate::config::LlmConfig;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM connection error: {0}")]
    ConnectionError(String),
    #[error("LLM response error: {0}")]
    ResponseError(String),
    #[error("LLM configuration error: {0}")]
    ConfigError(String),
}

/// A single request/response chat completion.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LlmError>;

    fn name(&self) -> &str;
}

pub struct LlmManager {
    model: Box<dyn ChatModel>,
}

impl LlmManager {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let model: Box<dyn ChatModel> = match config.backend.as_str() {
            "remote" => Box::new(providers::remote::RemoteLlmProvider::new(config)?),
            "ollama" => Box::new(providers::ollama::OllamaProvider::new(config)?),
            _ => {
                return Err(LlmError::ConfigError(format!(
                    "Unsupported LLM backend: {}",
                    config.backend
                )))
            }
        };

        Ok(Self { model })
    }
}

#[async_trait]
impl ChatModel for LlmManager {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LlmError> {
        self.model.complete(system_prompt, user_prompt).await
    }

    fn name(&self) -> &str {
        self.model.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn test_unknown_backend_is_config_error() {
        let mut config = AppConfig::default().llm;
        config.backend = "local".to_string();
        match LlmManager::new(&config) {
            Err(LlmError::ConfigError(msg)) => assert!(msg.contains("local")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected a configuration error"),
        }
    }

    #[test]
    fn test_remote_backend_requires_api_key() {
        let config = AppConfig::default().llm;
        assert!(matches!(
            LlmManager::new(&config),
            Err(LlmError::ConfigError(_))
        ));
    }

    #[test]
    fn test_ollama_backend_needs_no_key() {
        let mut config = AppConfig::default().llm;
        config.backend = "ollama".to_string();
        let manager = LlmManager::new(&config).unwrap();
        assert_eq!(manager.name(), "ollama");
    }
}
