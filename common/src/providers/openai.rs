use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs, CreateEmbeddingRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::error::AppError;

use super::{chunk_batches, EmbeddingProvider, GenerationProvider, Message, Role};

/// Maximum embedding batch size accepted per request by the OpenAI API.
const OPENAI_EMBED_BATCH: usize = 100;

pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
    model: String,
    embedding_model: String,
    dimension: usize,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        Self {
            client: Client::with_config(config),
            model: model.into(),
            embedding_model: "text-embedding-3-small".to_string(),
            dimension: 1536,
        }
    }

    fn map_err(err: async_openai::error::OpenAIError) -> AppError {
        match &err {
            async_openai::error::OpenAIError::ApiError(api_err) => {
                match api_err.code.as_deref() {
                    Some("rate_limit_exceeded") => AppError::RateLimit(err.to_string()),
                    _ => AppError::Unrecoverable(err.to_string()),
                }
            }
            async_openai::error::OpenAIError::Reqwest(_) => AppError::ServerFault(err.to_string()),
            _ => AppError::Unrecoverable(err.to_string()),
        }
    }

    fn to_openai_message(
        msg: &Message,
    ) -> Result<ChatCompletionRequestMessage, async_openai::error::OpenAIError> {
        Ok(match msg.role {
            Role::System => ChatCompletionRequestSystemMessageArgs::default()
                .content(msg.content.clone())
                .build()?
                .into(),
            Role::User => ChatCompletionRequestUserMessageArgs::default()
                .content(msg.content.clone())
                .build()?
                .into(),
            Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                .content(msg.content.clone())
                .build()?
                .into(),
        })
    }
}

#[async_trait]
impl GenerationProvider for OpenAiProvider {
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
        let openai_messages = messages
            .iter()
            .map(Self::to_openai_message)
            .collect::<Result<Vec<_>, _>>()
            .map_err(Self::map_err)?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&self.model)
            .messages(openai_messages)
            .temperature(temperature);
        if let Some(max_tokens) = max_tokens {
            builder.max_tokens(max_tokens);
        }
        let request = builder.build().map_err(Self::map_err)?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(Self::map_err)?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::Unrecoverable("empty completion from openai".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn backend_tag(&self) -> &'static str {
        "openai"
    }

    async fn is_available(&self) -> bool {
        self.generate("test", Some(1), 0.0).await.is_ok()
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in chunk_batches(texts, OPENAI_EMBED_BATCH) {
            let request = CreateEmbeddingRequestArgs::default()
                .model(&self.embedding_model)
                .input(batch.to_vec())
                .build()
                .map_err(Self::map_err)?;

            let response = self
                .client
                .embeddings()
                .create(request)
                .await
                .map_err(Self::map_err)?;

            out.extend(response.data.into_iter().map(|d| d.embedding));
        }
        Ok(out)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn backend_tag(&self) -> &'static str {
        "openai"
    }

    async fn is_available(&self) -> bool {
        EmbeddingProvider::embed_query(self, "test").await.is_ok()
    }
}
