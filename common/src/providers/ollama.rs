use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

use super::{EmbeddingProvider, GenerationProvider, Message, Role};

/// Local-only provider, reachable over HTTP against a running Ollama daemon.
/// The only provider admissible under `local` mode.
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    fn map_status(status: reqwest::StatusCode, body: String) -> AppError {
        if status.as_u16() == 429 {
            AppError::RateLimit(body)
        } else if status.is_server_error() {
            AppError::ServerFault(body)
        } else {
            AppError::Unrecoverable(format!("ollama returned {status}: {body}"))
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}

#[async_trait]
impl GenerationProvider for OllamaProvider {
    async fn generate(
        &self,
        prompt: &str,
        _max_tokens: Option<u32>,
        temperature: f32,
    ) -> Result<String, AppError> {
        let resp = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
                options: GenerateOptions { temperature },
            })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Self::map_status(status, body));
        }

        Ok(resp.json::<GenerateResponse>().await?.response)
    }

    async fn generate_with_messages(
        &self,
        messages: &[Message],
        max_tokens: Option<u32>,
        temperature: f32,
    ) -> Result<String, AppError> {
        let prompt = messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                format!("{role}: {}", m.content)
            })
            .collect::<Vec<_>>()
            .join("\n");
        self.generate(&prompt, max_tokens, temperature).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn backend_tag(&self) -> &'static str {
        "ollama"
    }

    async fn is_available(&self) -> bool {
        self.generate("test", Some(1), 0.0).await.is_ok()
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            let resp = self
                .client
                .post(format!("{}/api/embeddings", self.base_url))
                .json(&EmbeddingsRequest {
                    model: &self.model,
                    prompt: text,
                })
                .send()
                .await?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(Self::map_status(status, body));
            }

            out.push(resp.json::<EmbeddingsResponse>().await?.embedding);
        }
        Ok(out)
    }

    fn dimension(&self) -> usize {
        // Fixed per the llama3 family; varies by model in principle, but
        // Ollama's embeddings endpoint does not report it up front.
        4096
    }

    fn backend_tag(&self) -> &'static str {
        "ollama"
    }

    async fn is_available(&self) -> bool {
        EmbeddingProvider::embed_query(self, "test").await.is_ok()
    }
}
