use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use common::error::AppError;
use common::models::{DocumentSource, IndexResult, QueryResponse};
use serde::{Deserialize, Serialize};
use surrealdb::engine::any::{connect, Any};
use surrealdb::Surreal;

/// Append-only row for one `index_documents` invocation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexRun {
    pub run_id: String,
    pub workspace_id: String,
    pub timestamp: DateTime<Utc>,
    pub files_processed: usize,
    pub files_skipped: usize,
    pub total_chunks: usize,
    pub processing_time_ms: f64,
    pub document_sources: Vec<DocumentSource>,
    pub embed_provider: String,
}

/// Append-only row for one `query` invocation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryRun {
    pub run_id: String,
    pub workspace_id: String,
    pub timestamp: DateTime<Utc>,
    pub question: String,
    pub answer: String,
    pub citation_count: usize,
    pub model_used: String,
    pub provider: String,
    pub latency_ms: f64,
    pub excerpt_hashes: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkspaceStats {
    pub index_run_count: usize,
    pub query_run_count: usize,
    pub total_files: usize,
    pub total_chunks: usize,
    pub avg_processing_time_ms: f64,
    pub avg_query_latency_ms: f64,
    pub avg_citation_count: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct RunList {
    pub index_runs: Vec<IndexRun>,
    pub query_runs: Vec<QueryRun>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunType {
    Index,
    Query,
    All,
}

/// Durable, process-wide audit store of index and query runs, backed by a
/// single relational SurrealDB instance opened once at startup.
pub struct RunLedger {
    db: Surreal<Any>,
}

impl RunLedger {
    pub async fn open(ledger_path: &str) -> Result<Self, AppError> {
        if let Some(parent) = std::path::Path::new(ledger_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = connect(format!("rocksdb://{ledger_path}")).await?;
        db.use_ns("nexus").use_db("ledger").await?;
        db.query("DEFINE INDEX IF NOT EXISTS idx_index_workspace ON index_run FIELDS workspace_id, timestamp")
            .await?;
        db.query("DEFINE INDEX IF NOT EXISTS idx_query_workspace ON query_run FIELDS workspace_id, timestamp")
            .await?;
        Ok(Self { db })
    }

    #[cfg(any(test, feature = "test-utils"))]
    pub async fn memory(database: &str) -> Result<Self, AppError> {
        let db = connect("mem://").await?;
        db.use_ns("nexus").use_db(database).await?;
        db.query("DEFINE INDEX IF NOT EXISTS idx_index_workspace ON index_run FIELDS workspace_id, timestamp")
            .await?;
        db.query("DEFINE INDEX IF NOT EXISTS idx_query_workspace ON query_run FIELDS workspace_id, timestamp")
            .await?;
        Ok(Self { db })
    }

    fn mint_index_run_id(workspace_id: &str, now: DateTime<Utc>) -> String {
        format!("idx_{workspace_id}_{}", now.format("%Y%m%d_%H%M%S_%6f"))
    }

    /// Records one index run, minting an `idx_<workspace>_<timestamp>` run
    /// id. Returns that id.
    pub async fn record_index_run(
        &self,
        result: &IndexResult,
        embed_provider_tag: &str,
    ) -> Result<String, AppError> {
        let now = Utc::now();
        let run_id = Self::mint_index_run_id(&result.workspace_id, now);

        let row = IndexRun {
            run_id: run_id.clone(),
            workspace_id: result.workspace_id.clone(),
            timestamp: now,
            files_processed: result.files_processed,
            files_skipped: result.files_skipped,
            total_chunks: result.total_chunks,
            processing_time_ms: result.processing_time_ms,
            document_sources: result.document_sources.clone(),
            embed_provider: embed_provider_tag.to_string(),
        };

        let _: Option<IndexRun> = self.db.create(("index_run", run_id.as_str())).content(row).await?;
        Ok(run_id)
    }

    /// Records one query run, reusing `response.run_id`. Truncates the
    /// question to 500 and the answer to 2000 characters before storage.
    pub async fn record_query_run(
        &self,
        response: &QueryResponse,
        excerpt_hashes: &[String],
    ) -> Result<String, AppError> {
        let row = QueryRun {
            run_id: response.run_id.clone(),
            workspace_id: response.workspace_id.clone(),
            timestamp: response.timestamp,
            question: truncate_chars(&response.question, 500),
            answer: truncate_chars(&response.answer, 2000),
            citation_count: response.citations.len(),
            model_used: response.model_used.clone(),
            provider: response.provider.clone(),
            latency_ms: response.latency_ms,
            excerpt_hashes: excerpt_hashes.to_vec(),
        };

        let _: Option<QueryRun> = self
            .db
            .create(("query_run", row.run_id.as_str()))
            .content(row.clone())
            .await?;
        Ok(row.run_id)
    }

    /// Lists up to `limit` rows per requested table, newest first; empty
    /// lists for unrequested types.
    pub async fn list_runs(
        &self,
        workspace_id: Option<&str>,
        run_type: RunType,
        limit: usize,
    ) -> Result<RunList, AppError> {
        let mut runs = RunList::default();

        if matches!(run_type, RunType::Index | RunType::All) {
            let query = match workspace_id {
                Some(_) => "SELECT * FROM index_run WHERE workspace_id = $workspace_id ORDER BY timestamp DESC LIMIT $limit",
                None => "SELECT * FROM index_run ORDER BY timestamp DESC LIMIT $limit",
            };
            let mut result = self
                .db
                .query(query)
                .bind(("workspace_id", workspace_id.map(str::to_string)))
                .bind(("limit", limit as i64))
                .await?;
            runs.index_runs = result.take(0)?;
        }

        if matches!(run_type, RunType::Query | RunType::All) {
            let query = match workspace_id {
                Some(_) => "SELECT * FROM query_run WHERE workspace_id = $workspace_id ORDER BY timestamp DESC LIMIT $limit",
                None => "SELECT * FROM query_run ORDER BY timestamp DESC LIMIT $limit",
            };
            let mut result = self
                .db
                .query(query)
                .bind(("workspace_id", workspace_id.map(str::to_string)))
                .bind(("limit", limit as i64))
                .await?;
            runs.query_runs = result.take(0)?;
        }

        Ok(runs)
    }

    /// Searches both tables in a fixed order (index first, then query) and
    /// tags the result with its run type.
    pub async fn get_run(&self, run_id: &str) -> Result<Option<RunRow>, AppError> {
        let index_row: Option<IndexRun> = self.db.select(("index_run", run_id)).await?;
        if let Some(row) = index_row {
            return Ok(Some(RunRow::Index(row)));
        }

        let query_row: Option<QueryRun> = self.db.select(("query_run", run_id)).await?;
        Ok(query_row.map(RunRow::Query))
    }

    /// Counts, sums, and averages over a workspace's rows.
    pub async fn get_workspace_stats(&self, workspace_id: &str) -> Result<WorkspaceStats, AppError> {
        let mut result = self
            .db
            .query("SELECT * FROM index_run WHERE workspace_id = $workspace_id")
            .bind(("workspace_id", workspace_id.to_string()))
            .await?;
        let index_runs: Vec<IndexRun> = result.take(0)?;

        let mut result = self
            .db
            .query("SELECT * FROM query_run WHERE workspace_id = $workspace_id")
            .bind(("workspace_id", workspace_id.to_string()))
            .await?;
        let query_runs: Vec<QueryRun> = result.take(0)?;

        let total_files: usize = index_runs.iter().map(|r| r.files_processed).sum();
        let total_chunks: usize = index_runs.iter().map(|r| r.total_chunks).sum();
        let avg_processing_time_ms = average(index_runs.iter().map(|r| r.processing_time_ms));
        let avg_query_latency_ms = average(query_runs.iter().map(|r| r.latency_ms));
        let avg_citation_count = average(query_runs.iter().map(|r| r.citation_count as f64));

        Ok(WorkspaceStats {
            index_run_count: index_runs.len(),
            query_run_count: query_runs.len(),
            total_files,
            total_chunks,
            avg_processing_time_ms,
            avg_query_latency_ms,
            avg_citation_count,
        })
    }

    /// Deletes rows strictly older than `now - days`. Returns the deleted
    /// count across both tables.
    pub async fn cleanup_old_runs(&self, days: i64) -> Result<usize, AppError> {
        let cutoff = Utc::now() - Duration::days(days);

        let mut result = self
            .db
            .query("DELETE index_run WHERE timestamp < $cutoff RETURN BEFORE")
            .bind(("cutoff", cutoff))
            .await?;
        let deleted_index: Vec<IndexRun> = result.take(0)?;

        let mut result = self
            .db
            .query("DELETE query_run WHERE timestamp < $cutoff RETURN BEFORE")
            .bind(("cutoff", cutoff))
            .await?;
        let deleted_query: Vec<QueryRun> = result.take(0)?;

        Ok(deleted_index.len() + deleted_query.len())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "run_type", rename_all = "lowercase")]
pub enum RunRow {
    Index(IndexRun),
    Query(QueryRun),
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

fn average(values: impl Iterator<Item = f64> + Clone) -> f64 {
    let count = values.clone().count();
    if count == 0 {
        return 0.0;
    }
    values.sum::<f64>() / count as f64
}

pub type SharedLedger = Arc<RunLedger>;
