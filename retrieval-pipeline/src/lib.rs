#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use common::error::AppError;
use common::models::{Citation, DocumentSource, IndexRequest, IndexResult, QueryRequest, QueryResponse};
use common::policy::PolicyRedactor;
use common::providers::{chunk_batches, with_retry, EmbeddingProvider, GenerationProvider};
use common::storage::vector_store::VectorStore;
use uuid::Uuid;

const EXCERPT_RESPONSE_TRUNCATION: usize = 200;

/// Per-workspace RAG pipeline: a generation capability, an embedding
/// capability, a redactor, and a handle into the workspace's vector store
/// partition. Constructed once per workspace and cached by the caller.
pub struct RagPipeline {
    pub llm: Arc<dyn GenerationProvider>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub redactor: PolicyRedactor,
    pub vector_store: Arc<VectorStore>,
    pub embed_batch_limit: usize,
}

impl RagPipeline {
    pub fn new(
        llm: Arc<dyn GenerationProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        redactor: PolicyRedactor,
        vector_store: Arc<VectorStore>,
        embed_batch_limit: usize,
    ) -> Self {
        Self {
            llm,
            embedder,
            redactor,
            vector_store,
            embed_batch_limit,
        }
    }

    /// Loads, chunks, embeds, and indexes the requested paths. Missing
    /// paths and unsupported extensions are not an error; they count
    /// toward `files_skipped`.
    pub async fn index_documents(
        &self,
        request: &IndexRequest,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Result<IndexResult, AppError> {
        let started = Instant::now();

        let (documents, files_skipped) = ingestion_pipeline::load_paths(&request.paths).await?;

        let mut sources: Vec<DocumentSource> = Vec::with_capacity(documents.len());
        let mut all_chunks = Vec::new();

        for document in &documents {
            sources.push(document.source.clone());
            let chunks = ingestion_pipeline::chunker::chunk_text(
                &document.source.file_path,
                &document.text,
                chunk_size,
                chunk_overlap,
            );
            all_chunks.extend(chunks);
        }

        let total_chunks = all_chunks.len();
        let texts: Vec<String> = all_chunks.iter().map(|c| c.content.clone()).collect();

        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in chunk_batches(&texts, self.embed_batch_limit) {
            let batch = batch.to_vec();
            let embedder = self.embedder.clone();
            let vectors = with_retry(|| {
                let embedder = embedder.clone();
                let batch = batch.clone();
                async move { embedder.embed_documents(&batch).await }
            })
            .await?;
            embeddings.extend(vectors);
        }

        let chunks_with_embeddings: Vec<_> = all_chunks.into_iter().zip(embeddings).collect();
        if !chunks_with_embeddings.is_empty() {
            self.vector_store
                .upsert_chunks(&chunks_with_embeddings, self.embedder.dimension())
                .await?;
        }

        Ok(IndexResult {
            workspace_id: request.workspace_id.clone(),
            files_processed: documents.len(),
            files_skipped,
            total_chunks,
            processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            document_sources: sources,
        })
    }

    /// Retrieves, redacts, and answers. Fails with `not_indexed` if the
    /// workspace has never been materialized.
    pub async fn query(&self, request: &QueryRequest) -> Result<QueryResponse, AppError> {
        let started = Instant::now();

        let question_embedding = {
            let embedder = self.embedder.clone();
            let question = request.question.clone();
            with_retry(|| {
                let embedder = embedder.clone();
                let question = question.clone();
                async move { embedder.embed_query(&question).await }
            })
            .await?
        };

        let Some(results) = self
            .vector_store
            .search(&question_embedding, request.max_results as usize, self.embedder.dimension())
            .await?
        else {
            return Err(AppError::NotIndexed {
                workspace: request.workspace_id.clone(),
            });
        };

        let citations: Vec<Citation> = results
            .into_iter()
            .enumerate()
            .map(|(i, (chunk, _score))| Citation {
                source: chunk.source,
                page: chunk.page,
                excerpt: chunk.content,
                relevance_score: 1.0 / (i as f64 + 1.0),
                content_hash: String::new(),
            })
            .collect();

        let (safe_context, excerpt_hashes) = self.redactor.redact_snippets(&citations);
        let citations: Vec<Citation> = citations
            .into_iter()
            .zip(excerpt_hashes)
            .map(|(mut citation, hash)| {
                citation.content_hash = hash;
                citation
            })
            .collect();

        let prompt = format_prompt(&safe_context, &request.question);

        if !self.redactor.validate_outbound_payload(&prompt, None) {
            return Err(AppError::PolicyViolation(
                "outbound prompt failed payload validation".to_string(),
            ));
        }

        let llm = self.llm.clone();
        let prompt_for_retry = prompt.clone();
        let answer = with_retry(|| {
            let llm = llm.clone();
            let prompt = prompt_for_retry.clone();
            async move { llm.generate(&prompt, None, 0.2).await }
        })
        .await?;

        let truncated_citations: Vec<Citation> = citations
            .into_iter()
            .map(|mut citation| {
                citation.excerpt = truncate_chars(&citation.excerpt, EXCERPT_RESPONSE_TRUNCATION);
                citation
            })
            .collect();

        Ok(QueryResponse {
            question: request.question.clone(),
            answer,
            citations: truncated_citations,
            workspace_id: request.workspace_id.clone(),
            model_used: self.llm.model_name().to_string(),
            provider: self.llm.backend_tag().to_string(),
            latency_ms: started.elapsed().as_secs_f64() * 1000.0,
            run_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
        })
    }
}

fn format_prompt(safe_context: &str, question: &str) -> String {
    format!(
        "You are NEXUS, an autonomous document intelligence agent.\n\
         Use the following context to answer the question accurately and\n\
         concisely. If you don't know, say so.\n\n\
         Context: {safe_context}\n\n\
         Question: {question}\n\n\
         Answer:"
    )
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common::providers::Message;
    use std::io::Write as _;

    struct FakeGen;
    #[async_trait]
    impl GenerationProvider for FakeGen {
        async fn generate(&self, _prompt: &str, _max_tokens: Option<u32>, _temperature: f32) -> Result<String, AppError> {
            Ok("the answer".to_string())
        }
        async fn generate_with_messages(&self, _messages: &[Message], _max_tokens: Option<u32>, _temperature: f32) -> Result<String, AppError> {
            Ok("the answer".to_string())
        }
        fn model_name(&self) -> &str {
            "fake-model"
        }
        fn backend_tag(&self) -> &'static str {
            "fake"
        }
        async fn is_available(&self) -> bool {
            true
        }
    }

    struct FakeEmbed {
        dimension: usize,
    }
    #[async_trait]
    impl EmbeddingProvider for FakeEmbed {
        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
            Ok(texts.iter().map(|_| vec![1.0; self.dimension]).collect())
        }
        fn dimension(&self) -> usize {
            self.dimension
        }
        fn backend_tag(&self) -> &'static str {
            "fake"
        }
        async fn is_available(&self) -> bool {
            true
        }
    }

    fn pipeline(root: &std::path::Path, workspace: &str) -> RagPipeline {
        RagPipeline::new(
            Arc::new(FakeGen),
            Arc::new(FakeEmbed { dimension: 4 }),
            PolicyRedactor::new(true, 4000),
            Arc::new(VectorStore::new(root, workspace)),
            100,
        )
    }

    #[tokio::test]
    async fn query_on_empty_workspace_fails_not_indexed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pipeline = pipeline(dir.path(), "ws1");
        let request = QueryRequest {
            question: "what is this?".to_string(),
            workspace_id: "ws1".to_string(),
            max_results: 3,
        };
        let err = pipeline.query(&request).await.unwrap_err();
        assert_eq!(err.kind(), "not_indexed");
    }

    #[tokio::test]
    async fn index_then_query_round_trips_an_answer() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pipeline = pipeline(dir.path(), "ws1");

        let doc_dir = tempfile::tempdir().expect("tempdir");
        let doc_path = doc_dir.path().join("doc.txt");
        std::fs::File::create(&doc_path)
            .expect("create")
            .write_all(b"machine learning transforms text into vectors")
            .unwrap();

        let index_request = IndexRequest {
            paths: vec![doc_path.to_str().unwrap().to_string()],
            workspace_id: "ws1".to_string(),
            force_reindex: false,
        };
        let result = pipeline.index_documents(&index_request, 1000, 200).await.expect("index should succeed");
        assert_eq!(result.files_processed, 1);
        assert_eq!(result.files_skipped, 0);
        assert!(result.total_chunks > 0);

        let query_request = QueryRequest {
            question: "what does this do?".to_string(),
            workspace_id: "ws1".to_string(),
            max_results: 3,
        };
        let response = pipeline.query(&query_request).await.expect("query should succeed");
        assert_eq!(response.answer, "the answer");
        assert!(!response.citations.is_empty());
        assert_eq!(response.citations[0].relevance_score, 1.0);
    }

    #[tokio::test]
    async fn missing_paths_count_toward_files_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pipeline = pipeline(dir.path(), "ws1");
        let index_request = IndexRequest {
            paths: vec!["/nonexistent/path.txt".to_string()],
            workspace_id: "ws1".to_string(),
            force_reindex: false,
        };
        let result = pipeline.index_documents(&index_request, 1000, 200).await.expect("should not error");
        assert_eq!(result.files_processed, 0);
        assert_eq!(result.files_skipped, 1);
        assert_eq!(result.total_chunks, 0);
    }
}
