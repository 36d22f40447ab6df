use std::path::Path;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Clone, Copy, Deserialize, Serialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NexusMode {
    Local,
    Cloud,
    Hybrid,
}

impl NexusMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Cloud => "cloud",
            Self::Hybrid => "hybrid",
        }
    }
}

#[derive(Clone, Copy, Deserialize, Serialize, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Ollama,
    Anthropic,
    Openai,
    Vertex,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::Anthropic => "anthropic",
            Self::Openai => "openai",
            Self::Vertex => "vertex",
        }
    }

    pub fn all() -> &'static [Self] {
        &[Self::Ollama, Self::Anthropic, Self::Openai, Self::Vertex]
    }
}

#[derive(Clone, Copy, Deserialize, Serialize, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EmbedProvider {
    Ollama,
    Openai,
    Vertex,
}

impl EmbedProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::Openai => "openai",
            Self::Vertex => "vertex",
        }
    }

    pub fn all() -> &'static [Self] {
        &[Self::Ollama, Self::Openai, Self::Vertex]
    }
}

fn default_mode() -> NexusMode {
    NexusMode::Hybrid
}
fn default_llm_provider() -> LlmProvider {
    LlmProvider::Ollama
}
fn default_embed_provider() -> EmbedProvider {
    EmbedProvider::Ollama
}
fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}
fn default_hybrid_safe_mode() -> bool {
    true
}
fn default_max_snippet_length() -> usize {
    4000
}
fn default_chroma_path() -> String {
    "./data/chroma".to_string()
}
fn default_ledger_path() -> String {
    "./data/ledger.db".to_string()
}
fn default_cache_dir() -> String {
    "./data/cache".to_string()
}
fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_ollama_model() -> String {
    "llama3".to_string()
}
fn default_anthropic_model() -> String {
    "claude-3-5-sonnet-20241022".to_string()
}
fn default_openai_model() -> String {
    "gpt-4-turbo-preview".to_string()
}
fn default_vertex_model() -> String {
    "gemini-1.5-pro".to_string()
}
fn default_http_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}

/// Typed view over environment-sourced configuration.
///
/// Loaded the same way the teacher loads its app config: an optional file
/// layered under process environment variables, then deserialized.
#[derive(Clone, Deserialize, Serialize, Debug)]
pub struct NexusConfig {
    #[serde(default = "default_mode")]
    pub mode: NexusMode,
    #[serde(default = "default_llm_provider")]
    pub llm_provider: LlmProvider,
    #[serde(default = "default_embed_provider")]
    pub embed_provider: EmbedProvider,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    #[serde(default = "default_hybrid_safe_mode")]
    pub hybrid_safe_mode: bool,
    #[serde(default = "default_max_snippet_length")]
    pub max_snippet_length: usize,

    #[serde(default = "default_chroma_path")]
    pub chroma_path: String,
    #[serde(default = "default_ledger_path")]
    pub ledger_path: String,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    #[serde(default = "default_ollama_base_url")]
    pub ollama_base_url: String,
    #[serde(default = "default_ollama_model")]
    pub ollama_model: String,

    pub anthropic_api_key: Option<String>,
    #[serde(default = "default_anthropic_model")]
    pub anthropic_model: String,

    pub openai_api_key: Option<String>,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    pub vertex_project_id: Option<String>,
    #[serde(default = "default_vertex_model")]
    pub vertex_model: String,

    #[serde(default = "default_http_host")]
    pub http_host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

impl NexusConfig {
    /// Validates the mode/provider/chunking invariants described in the
    /// configuration design. Fails fast with a descriptive `AppError`.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::BadRequest(format!(
                "chunk_overlap ({}) must be < chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }

        if matches!(self.mode, NexusMode::Cloud | NexusMode::Hybrid) {
            self.credential_for(self.llm_provider_credential_name())?;
        }

        for dir in [&self.chroma_path, &self.ledger_dir(), &self.cache_dir] {
            std::fs::create_dir_all(Path::new(dir))?;
        }

        Ok(())
    }

    fn ledger_dir(&self) -> String {
        Path::new(&self.ledger_path)
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| ".".to_string())
    }

    fn llm_provider_credential_name(&self) -> Option<&'static str> {
        match self.llm_provider {
            LlmProvider::Anthropic => Some("ANTHROPIC_API_KEY"),
            LlmProvider::Openai => Some("OPENAI_API_KEY"),
            LlmProvider::Vertex => Some("VERTEX_PROJECT_ID"),
            LlmProvider::Ollama => None,
        }
    }

    fn credential_for(&self, name: Option<&'static str>) -> Result<(), AppError> {
        let Some(name) = name else {
            return Ok(());
        };
        let present = match name {
            "ANTHROPIC_API_KEY" => self.anthropic_api_key.is_some(),
            "OPENAI_API_KEY" => self.openai_api_key.is_some(),
            "VERTEX_PROJECT_ID" => self.vertex_project_id.is_some(),
            _ => true,
        };
        if present {
            Ok(())
        } else {
            Err(AppError::Unconfigured(name.to_string()))
        }
    }
}

/// Loads configuration from an optional `config` file layered under the
/// process environment, matching the teacher's `get_config` shape.
///
/// `llm_provider`/`embed_provider` are checked against the known provider
/// names before the closed-enum deserialize runs, so an unrecognised name
/// surfaces as `AppError::UnknownProvider` (carrying the valid list)
/// rather than a generic config-deserialize failure.
pub fn get_config() -> Result<NexusConfig, AppError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    if let Ok(raw) = config.get_string("llm_provider") {
        validate_provider_name(&raw, LlmProvider::all().iter().map(LlmProvider::as_str))?;
    }
    if let Ok(raw) = config.get_string("embed_provider") {
        validate_provider_name(&raw, EmbedProvider::all().iter().map(EmbedProvider::as_str))?;
    }

    Ok(config.try_deserialize()?)
}

fn validate_provider_name(raw: &str, valid: impl Iterator<Item = &'static str>) -> Result<(), AppError> {
    let valid: Vec<String> = valid.map(str::to_string).collect();
    if valid.iter().any(|name| name.eq_ignore_ascii_case(raw)) {
        Ok(())
    } else {
        Err(AppError::UnknownProvider {
            requested: raw.to_string(),
            valid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> NexusConfig {
        NexusConfig {
            mode: NexusMode::Local,
            llm_provider: LlmProvider::Ollama,
            embed_provider: EmbedProvider::Ollama,
            chunk_size: 1000,
            chunk_overlap: 200,
            hybrid_safe_mode: true,
            max_snippet_length: 4000,
            chroma_path: std::env::temp_dir()
                .join("nexus-test-chroma")
                .to_string_lossy()
                .to_string(),
            ledger_path: std::env::temp_dir()
                .join("nexus-test-ledger.db")
                .to_string_lossy()
                .to_string(),
            cache_dir: std::env::temp_dir()
                .join("nexus-test-cache")
                .to_string_lossy()
                .to_string(),
            ollama_base_url: default_ollama_base_url(),
            ollama_model: default_ollama_model(),
            anthropic_api_key: None,
            anthropic_model: default_anthropic_model(),
            openai_api_key: None,
            openai_model: default_openai_model(),
            vertex_project_id: None,
            vertex_model: default_vertex_model(),
            http_host: default_http_host(),
            http_port: 8080,
        }
    }

    #[test]
    fn chunk_overlap_equal_to_chunk_size_fails() {
        let mut cfg = base_config();
        cfg.chunk_overlap = cfg.chunk_size;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn local_mode_with_ollama_validates() {
        let cfg = base_config();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn cloud_mode_missing_credential_fails() {
        let mut cfg = base_config();
        cfg.mode = NexusMode::Cloud;
        cfg.llm_provider = LlmProvider::Openai;
        cfg.openai_api_key = None;
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.kind(), "unconfigured");
    }

    #[test]
    fn unrecognised_provider_name_is_rejected_with_valid_list() {
        let err = validate_provider_name("bedrock", LlmProvider::all().iter().map(LlmProvider::as_str))
            .unwrap_err();
        assert_eq!(err.kind(), "unknown_provider");
        match err {
            AppError::UnknownProvider { requested, valid } => {
                assert_eq!(requested, "bedrock");
                assert!(valid.contains(&"ollama".to_string()));
            }
            other => panic!("expected UnknownProvider, got {other:?}"),
        }
    }

    #[test]
    fn recognised_provider_name_is_case_insensitively_accepted() {
        assert!(
            validate_provider_name("OpenAI", LlmProvider::all().iter().map(LlmProvider::as_str)).is_ok()
        );
    }

    #[test]
    fn cloud_mode_with_credential_validates() {
        let mut cfg = base_config();
        cfg.mode = NexusMode::Cloud;
        cfg.llm_provider = LlmProvider::Openai;
        cfg.openai_api_key = Some("sk-test".to_string());
        assert!(cfg.validate().is_ok());
    }
}
