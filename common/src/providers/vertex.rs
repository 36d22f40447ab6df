use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

use super::{chunk_batches, EmbeddingProvider, GenerationProvider, Message, Role};

/// Maximum embedding batch size accepted per request by the Vertex AI API.
const VERTEX_EMBED_BATCH: usize = 250;

/// Cloud provider reachable over Vertex AI's generative-language REST API.
pub struct VertexProvider {
    client: Client,
    project_id: String,
    model: String,
    embedding_model: String,
    dimension: usize,
}

impl VertexProvider {
    pub fn new(project_id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            project_id: project_id.into(),
            model: model.into(),
            embedding_model: "text-embedding-004".to_string(),
            dimension: 768,
        }
    }

    fn map_status(status: reqwest::StatusCode, body: String) -> AppError {
        if status.as_u16() == 429 {
            AppError::RateLimit(body)
        } else if status.is_server_error() {
            AppError::ServerFault(body)
        } else {
            AppError::Unrecoverable(format!("vertex returned {status}: {body}"))
        }
    }

    fn generate_endpoint(&self) -> String {
        format!(
            "https://generativelanguage.googleapis.com/v1/projects/{}/models/{}:generateContent",
            self.project_id, self.model
        )
    }

    fn embed_endpoint(&self) -> String {
        format!(
            "https://generativelanguage.googleapis.com/v1/projects/{}/models/{}:batchEmbedContents",
            self.project_id, self.embedding_model
        )
    }
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens", skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Vec<Candidate>,
}

#[derive(Serialize)]
struct EmbedRequestItem<'a> {
    model: &'a str,
    content: Content<'a>,
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedRequestItem<'a>>,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    embeddings: Vec<EmbeddingValues>,
}

#[async_trait]
impl GenerationProvider for VertexProvider {
    async fn generate(
        &self,
        prompt: &str,
        max_tokens: Option<u32>,
        temperature: f32,
    ) -> Result<String, AppError> {
        self.generate_with_messages(
            &[Message {
                role: Role::User,
                content: prompt.to_string(),
            }],
            max_tokens,
            temperature,
        )
        .await
    }

    async fn generate_with_messages(
        &self,
        messages: &[Message],
        max_tokens: Option<u32>,
        temperature: f32,
    ) -> Result<String, AppError> {
        let contents = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| Content {
                role: if m.role == Role::Assistant { "model" } else { "user" },
                parts: vec![Part { text: &m.content }],
            })
            .collect();

        let resp = self
            .client
            .post(self.generate_endpoint())
            .json(&GenerateContentRequest {
                contents,
                generation_config: GenerationConfig {
                    temperature,
                    max_output_tokens: max_tokens,
                },
            })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Self::map_status(status, body));
        }

        let body = resp.json::<GenerateContentResponse>().await?;
        body.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| AppError::Unrecoverable("empty completion from vertex".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn backend_tag(&self) -> &'static str {
        "vertex"
    }

    async fn is_available(&self) -> bool {
        self.generate("test", Some(1), 0.0).await.is_ok()
    }
}

#[async_trait]
impl EmbeddingProvider for VertexProvider {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in chunk_batches(texts, VERTEX_EMBED_BATCH) {
            let requests = batch
                .iter()
                .map(|text| EmbedRequestItem {
                    model: &self.embedding_model,
                    content: Content {
                        role: "user",
                        parts: vec![Part { text }],
                    },
                })
                .collect();

            let resp = self
                .client
                .post(self.embed_endpoint())
                .json(&BatchEmbedRequest { requests })
                .send()
                .await?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(Self::map_status(status, body));
            }

            let body = resp.json::<BatchEmbedResponse>().await?;
            out.extend(body.embeddings.into_iter().map(|e| e.values));
        }
        Ok(out)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn backend_tag(&self) -> &'static str {
        "vertex"
    }

    async fn is_available(&self) -> bool {
        EmbeddingProvider::embed_query(self, "test").await.is_ok()
    }
}
