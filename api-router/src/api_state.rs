use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use common::config::NexusConfig;
use common::error::AppError;
use common::policy::PolicyRedactor;
use common::providers::{get_providers, EmbeddingProvider, GenerationProvider};
use common::storage::vector_store::VectorStoreRegistry;
use ledger::RunLedger;
use retrieval_pipeline::RagPipeline;
use tokio::sync::RwLock;

/// Process-wide state shared by every HTTP handler: the two shared
/// provider capabilities, the per-workspace vector-store registry, the
/// ledger, and a per-workspace pipeline cache created once under lock.
#[derive(Clone)]
pub struct ApiState {
    pub config: NexusConfig,
    pub llm: Arc<dyn GenerationProvider>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub vector_stores: Arc<VectorStoreRegistry>,
    pub ledger: Arc<RunLedger>,
    pipelines: Arc<RwLock<HashMap<String, Arc<RagPipeline>>>>,
    pub start_time: Instant,
    pub query_count: Arc<AtomicU64>,
}

impl ApiState {
    pub async fn new(config: NexusConfig) -> Result<Self, AppError> {
        config.validate()?;

        let (llm, embedder) = get_providers(&config)?;
        let vector_stores = Arc::new(VectorStoreRegistry::new(config.chroma_path.clone()));
        let ledger = Arc::new(RunLedger::open(&config.ledger_path).await?);

        Ok(Self {
            config,
            llm,
            embedder,
            vector_stores,
            ledger,
            pipelines: Arc::new(RwLock::new(HashMap::new())),
            start_time: Instant::now(),
            query_count: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Materialises (or returns the cached) pipeline for `workspace_id`.
    /// Created once under lock, per the shared-resource policy.
    pub async fn pipeline_for(&self, workspace_id: &str) -> Arc<RagPipeline> {
        if let Some(pipeline) = self.pipelines.read().await.get(workspace_id) {
            return pipeline.clone();
        }

        let mut guard = self.pipelines.write().await;
        if let Some(pipeline) = guard.get(workspace_id) {
            return pipeline.clone();
        }

        let vector_store = self.vector_stores.get_or_create(workspace_id).await;
        let redactor = PolicyRedactor::new(self.config.hybrid_safe_mode, self.config.max_snippet_length);
        let embed_batch_limit = match self.config.embed_provider {
            common::config::EmbedProvider::Openai => 100,
            common::config::EmbedProvider::Vertex => 250,
            common::config::EmbedProvider::Ollama => usize::MAX,
        };

        let pipeline = Arc::new(RagPipeline::new(
            self.llm.clone(),
            self.embedder.clone(),
            redactor,
            vector_store,
            embed_batch_limit,
        ));
        guard.insert(workspace_id.to_string(), pipeline.clone());
        pipeline
    }

    pub fn record_query(&self) {
        self.query_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_seconds(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }
}
