pub mod anthropic;
pub mod ollama;
pub mod openai;
pub mod vertex;

use async_trait::async_trait;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

use crate::error::AppError;

/// A single role-tagged message, the richer of the two generation inputs.
#[derive(Clone, Debug)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Generation capability: prompt or messages in, text out.
///
/// Concrete backends are tagged variants constructed by the router; the
/// `backend_tag` is the stable identifier surfaced in responses instead of
/// any runtime type reflection.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        max_tokens: Option<u32>,
        temperature: f32,
    ) -> Result<String, AppError>;

    async fn generate_with_messages(
        &self,
        messages: &[Message],
        max_tokens: Option<u32>,
        temperature: f32,
    ) -> Result<String, AppError>;

    fn model_name(&self) -> &str;

    fn backend_tag(&self) -> &'static str;

    async fn is_available(&self) -> bool;
}

/// Embedding capability: one string or a batch in, fixed-dimension vectors out.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, AppError> {
        let mut batch = self.embed_documents(std::slice::from_ref(&text.to_string())).await?;
        Ok(batch.remove(0))
    }

    fn dimension(&self) -> usize;

    fn backend_tag(&self) -> &'static str;

    async fn is_available(&self) -> bool;
}

/// Retries `op` up to 3 attempts total with a base-1s, factor-2 exponential
/// back-off, but only for `rate_limit` / `server_fault` kinds; every other
/// error kind is surfaced on the first failure.
pub async fn with_retry<F, Fut, T>(op: F) -> Result<T, AppError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, AppError>>,
{
    let strategy = ExponentialBackoff::from_millis(1000)
        .factor(2)
        .map(jitter)
        .take(2); // 2 retries after the first attempt = 3 attempts total

    RetryIf::spawn(
        strategy,
        || op(),
        |err: &AppError| err.is_retryable(),
    )
    .await
}

/// Splits a batch of texts into provider-safe sub-batches of at most
/// `max_batch` items each.
pub fn chunk_batches(texts: &[String], max_batch: usize) -> Vec<&[String]> {
    texts.chunks(max_batch.max(1)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn with_retry_retries_rate_limit_up_to_three_attempts() {
        let attempts = AtomicUsize::new(0);
        let result: Result<(), AppError> = with_retry(|| async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(AppError::RateLimit("429".to_string()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn with_retry_does_not_retry_unrecoverable() {
        let attempts = AtomicUsize::new(0);
        let result: Result<(), AppError> = with_retry(|| async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(AppError::Unrecoverable("broken".to_string()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn chunk_batches_splits_at_boundary() {
        let texts: Vec<String> = (0..250).map(|i| i.to_string()).collect();
        let batches = chunk_batches(&texts, 100);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 100);
        assert_eq!(batches[2].len(), 50);
    }
}
