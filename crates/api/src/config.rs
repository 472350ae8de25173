use anyhow::{bail, Context, Result};
use communities::ReportConfig;
use extract::{ExtractorConfig, OllamaConfig};
use index::{ConsolidationConfig, EmbeddingConfig, Neo4jConfig};
use ingest::ChunkerConfig;
use query::{GlobalSearchConfig, LocalSearchConfig};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mode: OperationMode,
    pub bind: String,
    pub neo4j: Neo4jConfig,
    pub llm: OllamaConfig,
    pub embedding: EmbeddingConfig,
    pub chunker: ChunkerConfig,
    pub concurrency: ConcurrencyConfig,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    Fast,      // Cache aggressively, short timeouts
    Accurate,  // Always fresh, long timeouts
    Balanced,  // Default
}

impl FromStr for OperationMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(OperationMode::Fast),
            "balanced" => Ok(OperationMode::Balanced),
            "accurate" => Ok(OperationMode::Accurate),
            other => bail!("unknown operation mode '{}', expected fast, balanced or accurate", other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConcurrencyConfig {
    pub max_concurrent_llm_calls: usize,
    pub max_concurrent_extractions: usize,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::balanced_mode()
    }
}

impl AppConfig {
    fn with_mode(
        mode: OperationMode,
        concurrency: ConcurrencyConfig,
        retry: RetryConfig,
        cache: CacheConfig,
    ) -> Self {
        Self {
            mode,
            bind: "0.0.0.0:3000".to_string(),
            neo4j: Neo4jConfig::default(),
            llm: OllamaConfig::default(),
            embedding: EmbeddingConfig::default(),
            chunker: ChunkerConfig::default(),
            concurrency,
            retry,
            cache,
        }
    }

    pub fn balanced_mode() -> Self {
        Self::with_mode(
            OperationMode::Balanced,
            ConcurrencyConfig {
                max_concurrent_llm_calls: 3,
                max_concurrent_extractions: 5,
                request_timeout_secs: 120,
            },
            RetryConfig {
                max_retries: 3,
                initial_backoff_ms: 1000,
                max_backoff_ms: 10000,
            },
            CacheConfig {
                enabled: true,
                max_entries: 10000,
            },
        )
    }

    pub fn fast_mode() -> Self {
        Self::with_mode(
            OperationMode::Fast,
            ConcurrencyConfig {
                max_concurrent_llm_calls: 10,
                max_concurrent_extractions: 20,
                request_timeout_secs: 60,
            },
            RetryConfig {
                max_retries: 2,
                initial_backoff_ms: 500,
                max_backoff_ms: 5000,
            },
            CacheConfig {
                enabled: true,
                max_entries: 50000,
            },
        )
    }

    pub fn accurate_mode() -> Self {
        Self::with_mode(
            OperationMode::Accurate,
            ConcurrencyConfig {
                max_concurrent_llm_calls: 2,
                max_concurrent_extractions: 3,
                request_timeout_secs: 300,
            },
            RetryConfig {
                max_retries: 5,
                initial_backoff_ms: 2000,
                max_backoff_ms: 20000,
            },
            CacheConfig {
                enabled: false,
                max_entries: 0,
            },
        )
    }

    pub fn for_mode(mode: OperationMode) -> Self {
        match mode {
            OperationMode::Fast => Self::fast_mode(),
            OperationMode::Balanced => Self::balanced_mode(),
            OperationMode::Accurate => Self::accurate_mode(),
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Start from the `GRAPHRAG_MODE` preset, then apply individual overrides.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mode = match lookup("GRAPHRAG_MODE") {
            Some(value) => value.parse()?,
            None => OperationMode::Balanced,
        };
        let mut config = Self::for_mode(mode);

        if let Some(uri) = lookup("GRAPHRAG_NEO4J_URI") {
            config.neo4j.uri = uri;
        }
        if let Some(user) = lookup("GRAPHRAG_NEO4J_USER") {
            config.neo4j.user = user;
        }
        if let Some(password) = lookup("GRAPHRAG_NEO4J_PASSWORD") {
            config.neo4j.password = password;
        }
        if let Some(url) = lookup("GRAPHRAG_LLM_URL") {
            config.embedding.base_url = url.clone();
            config.llm.base_url = url;
        }
        if let Some(model) = lookup("GRAPHRAG_LLM_MODEL") {
            config.llm.model = model;
        }
        if let Some(model) = lookup("GRAPHRAG_EMBED_MODEL") {
            config.embedding.model = model;
        }
        if let Some(bind) = lookup("GRAPHRAG_BIND") {
            config.bind = bind;
        }
        if let Some(secs) = lookup("GRAPHRAG_LLM_TIMEOUT_SECS") {
            config.concurrency.request_timeout_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("GRAPHRAG_LLM_TIMEOUT_SECS is not a number: {}", secs))?;
        }
        if let Some(max) = lookup("GRAPHRAG_MAX_CONCURRENT_LLM") {
            let max: usize = max
                .trim()
                .parse()
                .with_context(|| format!("GRAPHRAG_MAX_CONCURRENT_LLM is not a number: {}", max))?;
            if max == 0 {
                bail!("GRAPHRAG_MAX_CONCURRENT_LLM must be at least 1");
            }
            config.concurrency.max_concurrent_llm_calls = max;
        }

        Ok(config)
    }

    pub fn llm_timeout(&self) -> Option<Duration> {
        match self.concurrency.request_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn extractor_config(&self) -> ExtractorConfig {
        ExtractorConfig {
            timeout: self.llm_timeout(),
            ..ExtractorConfig::default()
        }
    }

    pub fn consolidation_config(&self) -> ConsolidationConfig {
        ConsolidationConfig {
            max_concurrent: self.concurrency.max_concurrent_llm_calls,
            timeout: self.llm_timeout(),
            ..ConsolidationConfig::default()
        }
    }

    pub fn report_config(&self) -> ReportConfig {
        ReportConfig {
            max_concurrent: self.concurrency.max_concurrent_llm_calls,
            timeout: self.llm_timeout(),
            ..ReportConfig::default()
        }
    }

    pub fn global_search_config(&self, response_type: Option<String>) -> GlobalSearchConfig {
        let defaults = GlobalSearchConfig::default();
        GlobalSearchConfig {
            max_concurrent: self.concurrency.max_concurrent_llm_calls,
            timeout: self.llm_timeout(),
            response_type: response_type.unwrap_or(defaults.response_type.clone()),
            ..defaults
        }
    }

    pub fn local_search_config(&self, response_type: Option<String>) -> LocalSearchConfig {
        let defaults = LocalSearchConfig::default();
        LocalSearchConfig {
            timeout: self.llm_timeout(),
            response_type: response_type.unwrap_or(defaults.response_type.clone()),
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn empty_environment_is_balanced() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.mode, OperationMode::Balanced);
        assert_eq!(config.neo4j.uri, "bolt://localhost:7687");
        assert!(config.cache.enabled);
    }

    #[test]
    fn mode_preset_then_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("GRAPHRAG_MODE", "Accurate"),
            ("GRAPHRAG_NEO4J_URI", "bolt://graph:7687"),
            ("GRAPHRAG_LLM_URL", "http://ollama:11434"),
            ("GRAPHRAG_LLM_TIMEOUT_SECS", "45"),
            ("GRAPHRAG_MAX_CONCURRENT_LLM", "7"),
        ]))
        .unwrap();

        assert_eq!(config.mode, OperationMode::Accurate);
        assert!(!config.cache.enabled);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.neo4j.uri, "bolt://graph:7687");
        assert_eq!(config.llm.base_url, "http://ollama:11434");
        assert_eq!(config.embedding.base_url, "http://ollama:11434");
        assert_eq!(config.llm_timeout(), Some(Duration::from_secs(45)));
        assert_eq!(config.report_config().max_concurrent, 7);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(AppConfig::from_lookup(lookup(&[("GRAPHRAG_MODE", "turbo")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("GRAPHRAG_LLM_TIMEOUT_SECS", "soon")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("GRAPHRAG_MAX_CONCURRENT_LLM", "0")])).is_err());
    }

    #[test]
    fn zero_timeout_disables_deadline() {
        let config = AppConfig::from_lookup(lookup(&[("GRAPHRAG_LLM_TIMEOUT_SECS", "0")])).unwrap();
        assert_eq!(config.llm_timeout(), None);
    }

    #[test]
    fn response_type_flows_into_search_configs() {
        let config = AppConfig::default();
        assert_eq!(
            config.global_search_config(Some("single paragraph".into())).response_type,
            "single paragraph"
        );
        assert_eq!(config.local_search_config(None).response_type, "multiple paragraphs");
    }
}
