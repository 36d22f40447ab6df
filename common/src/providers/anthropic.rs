use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

use super::{GenerationProvider, Message, Role};

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Cloud generation provider. No embedding capability exists for Anthropic,
/// mirroring the original's router, which never admits
/// `embed_provider=anthropic`.
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    model: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn map_status(status: reqwest::StatusCode, body: String) -> AppError {
        if status.as_u16() == 429 {
            AppError::RateLimit(body)
        } else if status.is_server_error() {
            AppError::ServerFault(body)
        } else {
            AppError::Unrecoverable(format!("anthropic returned {status}: {body}"))
        }
    }
}

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: Option<&'a str>,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[async_trait]
impl GenerationProvider for AnthropicProvider {
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
        let system = messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.as_str());

        let turns = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| AnthropicMessage {
                role: if m.role == Role::Assistant { "assistant" } else { "user" },
                content: &m.content,
            })
            .collect();

        let resp = self
            .client
            .post(format!("{ANTHROPIC_API_BASE}/messages"))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&MessagesRequest {
                model: &self.model,
                max_tokens: max_tokens.unwrap_or(1024),
                temperature,
                system,
                messages: turns,
            })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Self::map_status(status, body));
        }

        let body = resp.json::<MessagesResponse>().await?;
        body.content
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or_else(|| AppError::Unrecoverable("empty completion from anthropic".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn backend_tag(&self) -> &'static str {
        "anthropic"
    }

    async fn is_available(&self) -> bool {
        self.generate("test", Some(1), 0.0).await.is_ok()
    }
}
