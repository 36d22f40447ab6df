use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata recorded per ingested file. Immutable once recorded.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DocumentSource {
    pub file_path: String,
    pub file_hash: String,
    pub file_mtime: f64,
    pub indexed_at: DateTime<Utc>,
}

/// A unit indexed in the vector store.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DocumentChunk {
    pub source: String,
    pub page: Option<u32>,
    pub chunk_index: usize,
    pub content: String,
}

/// Retrieval result returned to the caller and fed to the redactor.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    pub source: String,
    pub page: Option<u32>,
    pub excerpt: String,
    pub relevance_score: f64,
    pub content_hash: String,
}

fn default_workspace_id() -> String {
    "default".to_string()
}
fn default_max_results() -> u32 {
    3
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    #[serde(default = "default_workspace_id")]
    pub workspace_id: String,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

impl QueryRequest {
    /// Request-validation boundary per the data model invariants.
    pub fn validate(&self) -> Result<(), String> {
        let len = self.question.chars().count();
        if len == 0 || len > 5000 {
            return Err(format!(
                "question must be 1..=5000 characters, got {len}"
            ));
        }
        if self.max_results == 0 || self.max_results > 10 {
            return Err(format!(
                "max_results must be in [1, 10], got {}",
                self.max_results
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub question: String,
    pub answer: String,
    pub citations: Vec<Citation>,
    pub workspace_id: String,
    pub model_used: String,
    pub provider: String,
    pub latency_ms: f64,
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
}

fn default_force_reindex() -> bool {
    false
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexRequest {
    pub paths: Vec<String>,
    #[serde(default = "default_workspace_id")]
    pub workspace_id: String,
    #[serde(default = "default_force_reindex")]
    pub force_reindex: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexResult {
    pub workspace_id: String,
    pub files_processed: usize,
    pub files_skipped: usize,
    pub total_chunks: usize,
    pub processing_time_ms: f64,
    pub document_sources: Vec<DocumentSource>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub cache_hit_rate: f64,
    pub avg_query_latency_ms: f64,
    pub total_queries: u64,
    pub memory_mb: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub mode: String,
    pub llm_provider: String,
    pub embed_provider: String,
    pub vector_store_ready: bool,
    pub documents_indexed: usize,
    pub uptime_seconds: f64,
    pub metrics: PerformanceMetrics,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkspaceInfo {
    pub workspace_id: String,
    pub stats: serde_json::Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkspaceCreated {
    pub workspace_id: String,
    pub status: String,
    pub chroma_path: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceBanner {
    pub service: String,
    pub version: String,
    pub status: String,
    pub endpoints: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_request_rejects_empty_question() {
        let req = QueryRequest {
            question: String::new(),
            workspace_id: default_workspace_id(),
            max_results: 3,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn query_request_rejects_max_results_out_of_bounds() {
        let req = QueryRequest {
            question: "hello".to_string(),
            workspace_id: default_workspace_id(),
            max_results: 11,
        };
        assert!(req.validate().is_err());

        let req = QueryRequest {
            question: "hello".to_string(),
            workspace_id: default_workspace_id(),
            max_results: 0,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn query_request_accepts_boundary_values() {
        let req = QueryRequest {
            question: "x".repeat(5000),
            workspace_id: default_workspace_id(),
            max_results: 10,
        };
        assert!(req.validate().is_ok());
    }
}
