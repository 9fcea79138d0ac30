use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub backend: String, // "remote" or "ollama"
    pub model: String,
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    pub backend: String, // "hashing" or "remote"
    pub model: String,
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub dimension: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    pub default_dialect: String,
    pub default_top_k: usize,
    pub default_max_rows: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchemaConfig {
    pub seed_sample_data: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub web: WebConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub pipeline: PipelineConfig,
    pub schema: SchemaConfig,
}

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Register the sample e-commerce schema on startup
    #[arg(long)]
    pub seed_sample_data: bool,
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        let mut config_builder = Self::with_defaults(Config::builder())?;

        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            let default_locations = [
                "config.toml",
                "config/config.toml",
                "/etc/nl2sql/config.toml",
            ];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        // NL2SQL_LLM__API_KEY and friends
        config_builder = config_builder.add_source(
            Environment::with_prefix("NL2SQL")
                .prefix_separator("_")
                .separator("__"),
        );

        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        if let Some(host) = &args.host {
            config.web.host = host.clone();
        }
        if let Some(port) = args.port {
            config.web.port = port;
        }
        if args.seed_sample_data {
            config.schema.seed_sample_data = true;
        }

        Ok(config)
    }

    fn with_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        let defaults = AppConfig::default();
        builder
            .set_default("web.host", defaults.web.host)?
            .set_default("web.port", defaults.web.port as i64)?
            .set_default("llm.backend", defaults.llm.backend)?
            .set_default("llm.model", defaults.llm.model)?
            .set_default("llm.temperature", defaults.llm.temperature as f64)?
            .set_default("llm.max_tokens", defaults.llm.max_tokens as i64)?
            .set_default("llm.timeout_secs", defaults.llm.timeout_secs as i64)?
            .set_default("embedding.backend", defaults.embedding.backend)?
            .set_default("embedding.model", defaults.embedding.model)?
            .set_default("embedding.dimension", defaults.embedding.dimension as i64)?
            .set_default("embedding.timeout_secs", defaults.embedding.timeout_secs as i64)?
            .set_default("pipeline.default_dialect", defaults.pipeline.default_dialect)?
            .set_default("pipeline.default_top_k", defaults.pipeline.default_top_k as i64)?
            .set_default(
                "pipeline.default_max_rows",
                defaults.pipeline.default_max_rows as i64,
            )?
            .set_default("schema.seed_sample_data", defaults.schema.seed_sample_data)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            web: WebConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            llm: LlmConfig {
                backend: "remote".to_string(),
                model: "gpt-4o-mini".to_string(),
                api_key: None,
                api_url: None,
                temperature: 0.1,
                max_tokens: 2000,
                timeout_secs: 60,
            },
            embedding: EmbeddingConfig {
                backend: "hashing".to_string(),
                model: "text-embedding-3-small".to_string(),
                api_key: None,
                api_url: None,
                dimension: 256,
                timeout_secs: 30,
            },
            pipeline: PipelineConfig {
                default_dialect: "mysql".to_string(),
                default_top_k: 3,
                default_max_rows: 100,
            },
            schema: SchemaConfig {
                seed_sample_data: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_deserialize_without_file() {
        let config = AppConfig::with_defaults(Config::builder())
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize::<AppConfig>()
            .unwrap();

        assert_eq!(config.web.port, 3000);
        assert_eq!(config.llm.backend, "remote");
        assert_eq!(config.embedding.backend, "hashing");
        assert_eq!(config.pipeline.default_dialect, "mysql");
        assert_eq!(config.pipeline.default_top_k, 3);
        assert_eq!(config.pipeline.default_max_rows, 100);
        assert!(!config.schema.seed_sample_data);
        assert!(config.llm.api_key.is_none());
    }

    #[test]
    fn test_file_values_override_defaults() {
        let toml = r#"
[llm]
backend = "ollama"
model = "sqlcoder"

[pipeline]
default_top_k = 5
"#;
        let config = AppConfig::with_defaults(Config::builder())
            .unwrap()
            .add_source(File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize::<AppConfig>()
            .unwrap();

        assert_eq!(config.llm.backend, "ollama");
        assert_eq!(config.llm.model, "sqlcoder");
        assert_eq!(config.pipeline.default_top_k, 5);
        assert_eq!(config.web.host, "127.0.0.1");
    }
}
