use std::sync::Arc;

use serde::Serialize;

use crate::config::{EmbedProvider, LlmProvider, NexusConfig, NexusMode};
use crate::error::AppError;
use crate::providers::anthropic::AnthropicProvider;
use crate::providers::ollama::OllamaProvider;
use crate::providers::openai::OpenAiProvider;
use crate::providers::vertex::VertexProvider;
use crate::providers::{EmbeddingProvider, GenerationProvider};

/// Maps `(provider_name, mode)` to a concrete generation capability.
///
/// Construction is lazy: these functions build a client wrapper only; the
/// first network call happens on first use.
pub fn get_llm_provider(
    provider: LlmProvider,
    mode: NexusMode,
    config: &NexusConfig,
) -> Result<Arc<dyn GenerationProvider>, AppError> {
    if mode == NexusMode::Local && provider != LlmProvider::Ollama {
        return Err(AppError::ModeViolation {
            provider: provider.as_str().to_string(),
            mode: mode.as_str().to_string(),
        });
    }

    let provider: Arc<dyn GenerationProvider> = match provider {
        LlmProvider::Ollama => Arc::new(OllamaProvider::new(
            config.ollama_base_url.clone(),
            config.ollama_model.clone(),
        )),
        LlmProvider::Anthropic => {
            let key = config
                .anthropic_api_key
                .clone()
                .ok_or_else(|| AppError::Unconfigured("ANTHROPIC_API_KEY".to_string()))?;
            Arc::new(AnthropicProvider::new(key, config.anthropic_model.clone()))
        }
        LlmProvider::Openai => {
            let key = config
                .openai_api_key
                .clone()
                .ok_or_else(|| AppError::Unconfigured("OPENAI_API_KEY".to_string()))?;
            Arc::new(OpenAiProvider::new(key, config.openai_model.clone()))
        }
        LlmProvider::Vertex => {
            let project = config
                .vertex_project_id
                .clone()
                .ok_or_else(|| AppError::Unconfigured("VERTEX_PROJECT_ID".to_string()))?;
            Arc::new(VertexProvider::new(project, config.vertex_model.clone()))
        }
    };

    Ok(provider)
}

/// Maps `(provider_name, mode)` to a concrete embedding capability.
///
/// Anthropic has no embedding backend; requesting it is an unknown-provider
/// rejection rather than a silent fallback.
pub fn get_embedding_provider(
    provider: EmbedProvider,
    mode: NexusMode,
    config: &NexusConfig,
) -> Result<Arc<dyn EmbeddingProvider>, AppError> {
    if mode == NexusMode::Local && provider != EmbedProvider::Ollama {
        return Err(AppError::ModeViolation {
            provider: provider.as_str().to_string(),
            mode: mode.as_str().to_string(),
        });
    }

    let provider: Arc<dyn EmbeddingProvider> = match provider {
        EmbedProvider::Ollama => Arc::new(OllamaProvider::new(
            config.ollama_base_url.clone(),
            config.ollama_model.clone(),
        )),
        EmbedProvider::Openai => {
            let key = config
                .openai_api_key
                .clone()
                .ok_or_else(|| AppError::Unconfigured("OPENAI_API_KEY".to_string()))?;
            Arc::new(OpenAiProvider::new(key, config.openai_model.clone()))
        }
        EmbedProvider::Vertex => {
            let project = config
                .vertex_project_id
                .clone()
                .ok_or_else(|| AppError::Unconfigured("VERTEX_PROJECT_ID".to_string()))?;
            Arc::new(VertexProvider::new(project, config.vertex_model.clone()))
        }
    };

    Ok(provider)
}

/// Returns both capabilities atomically; if either selection fails the
/// caller observes only that error.
pub fn get_providers(
    config: &NexusConfig,
) -> Result<(Arc<dyn GenerationProvider>, Arc<dyn EmbeddingProvider>), AppError> {
    let llm = get_llm_provider(config.llm_provider, config.mode, config)?;
    let embed = get_embedding_provider(config.embed_provider, config.mode, config)?;
    Ok((llm, embed))
}

#[derive(Debug, Serialize)]
pub struct ConfigurationReport {
    pub valid: bool,
    pub mode: String,
    pub llm_provider: String,
    pub embed_provider: String,
    pub llm_available: bool,
    pub embed_available: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

/// Builds both providers and probes their availability, producing a report
/// suitable for an operator dashboard. `valid` is false iff `errors` is
/// non-empty.
pub async fn validate_configuration(config: &NexusConfig) -> ConfigurationReport {
    let mut warnings = Vec::new();
    let mut errors = Vec::new();

    if config.mode == NexusMode::Hybrid && !config.hybrid_safe_mode {
        warnings.push("HYBRID_SAFE_MODE disabled".to_string());
    }

    let llm = get_llm_provider(config.llm_provider, config.mode, config);
    let embed = get_embedding_provider(config.embed_provider, config.mode, config);

    let llm_available = match &llm {
        Ok(p) => {
            let available = p.is_available().await;
            if !available {
                warnings.push(format!("{} generation provider unavailable", p.backend_tag()));
            }
            available
        }
        Err(e) => {
            errors.push(e.to_string());
            false
        }
    };

    let embed_available = match &embed {
        Ok(p) => {
            let available = p.is_available().await;
            if !available {
                warnings.push(format!("{} embedding provider unavailable", p.backend_tag()));
            }
            available
        }
        Err(e) => {
            errors.push(e.to_string());
            false
        }
    };

    ConfigurationReport {
        valid: errors.is_empty(),
        mode: config.mode.as_str().to_string(),
        llm_provider: config.llm_provider.as_str().to_string(),
        embed_provider: config.embed_provider.as_str().to_string(),
        llm_available,
        embed_available,
        warnings,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(mode: NexusMode, llm: LlmProvider, embed: EmbedProvider) -> NexusConfig {
        NexusConfig {
            mode,
            llm_provider: llm,
            embed_provider: embed,
            chunk_size: 1000,
            chunk_overlap: 200,
            hybrid_safe_mode: true,
            max_snippet_length: 4000,
            chroma_path: "./data/chroma".to_string(),
            ledger_path: "./data/ledger.db".to_string(),
            cache_dir: "./data/cache".to_string(),
            ollama_base_url: "http://localhost:11434".to_string(),
            ollama_model: "llama3".to_string(),
            anthropic_api_key: None,
            anthropic_model: "claude".to_string(),
            openai_api_key: None,
            openai_model: "gpt".to_string(),
            vertex_project_id: None,
            vertex_model: "gemini".to_string(),
            http_host: "0.0.0.0".to_string(),
            http_port: 8080,
        }
    }

    #[test]
    fn local_mode_rejects_non_local_llm() {
        let config = config_with(NexusMode::Local, LlmProvider::Anthropic, EmbedProvider::Ollama);
        let err = get_llm_provider(LlmProvider::Anthropic, NexusMode::Local, &config).unwrap_err();
        assert_eq!(err.kind(), "mode_violation");
    }

    #[test]
    fn cloud_mode_missing_credential_is_unconfigured() {
        let config = config_with(NexusMode::Cloud, LlmProvider::Openai, EmbedProvider::Openai);
        let err = get_llm_provider(LlmProvider::Openai, NexusMode::Cloud, &config).unwrap_err();
        assert_eq!(err.kind(), "unconfigured");
    }

    #[test]
    fn local_mode_with_ollama_succeeds() {
        let config = config_with(NexusMode::Local, LlmProvider::Ollama, EmbedProvider::Ollama);
        assert!(get_llm_provider(LlmProvider::Ollama, NexusMode::Local, &config).is_ok());
        assert!(get_embedding_provider(EmbedProvider::Ollama, NexusMode::Local, &config).is_ok());
    }

    #[tokio::test]
    async fn validate_configuration_reports_hybrid_safe_mode_warning() {
        let mut config = config_with(NexusMode::Hybrid, LlmProvider::Ollama, EmbedProvider::Ollama);
        config.hybrid_safe_mode = false;
        let report = validate_configuration(&config).await;
        assert!(report.warnings.iter().any(|w| w.contains("HYBRID_SAFE_MODE")));
    }

    #[tokio::test]
    async fn validate_configuration_invalid_when_credential_missing() {
        let config = config_with(NexusMode::Cloud, LlmProvider::Openai, EmbedProvider::Ollama);
        let report = validate_configuration(&config).await;
        assert!(!report.valid);
        assert!(!report.errors.is_empty());
    }
}
