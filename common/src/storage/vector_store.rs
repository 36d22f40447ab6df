use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use surrealdb::engine::any::{connect, Any};
use surrealdb::Surreal;
use tokio::sync::RwLock;

use crate::error::AppError;
use crate::models::DocumentChunk;

const INDEX_POLL_INTERVAL_MS: u64 = 50;

/// Per-workspace lifecycle state, per the RAG pipeline's state machine:
/// `empty` (nothing on disk yet), `closed-on-disk` (a populated partition
/// exists but no handle is bound in this process), `open` (handle bound).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceState {
    Empty,
    ClosedOnDisk,
    Open,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredChunk {
    source: String,
    page: Option<u32>,
    chunk_index: usize,
    content: String,
    embedding: Vec<f32>,
}

/// A vector-store partition rooted at `<chroma_root>/<workspace_id>`,
/// backed by an embedded, persistent SurrealDB instance with a native HNSW
/// index. The handle is opened lazily: the first read attempt tests whether
/// the directory exists and is non-empty and, if so, opens it; otherwise it
/// stays unbound until an index operation creates it.
pub struct VectorStore {
    root: PathBuf,
    workspace_id: String,
    handle: RwLock<Option<Surreal<Any>>>,
}

impl VectorStore {
    pub fn new(chroma_root: impl Into<PathBuf>, workspace_id: impl Into<String>) -> Self {
        Self {
            root: chroma_root.into(),
            workspace_id: workspace_id.into(),
            handle: RwLock::new(None),
        }
    }

    pub fn partition_path(&self) -> PathBuf {
        self.root.join(&self.workspace_id)
    }

    /// Creates the partition directory on disk without opening a database
    /// handle, so the workspace is immediately visible to
    /// `VectorStoreRegistry::list_partition_ids` even before anything is
    /// indexed into it.
    pub fn create_partition_dir(&self) -> Result<(), AppError> {
        std::fs::create_dir_all(self.partition_path())?;
        Ok(())
    }

    fn partition_is_populated(&self) -> bool {
        let path = self.partition_path();
        path.exists() && std::fs::read_dir(&path).map(|mut d| d.next().is_some()).unwrap_or(false)
    }

    /// Current lifecycle state without opening the handle.
    pub async fn state(&self) -> WorkspaceState {
        if self.handle.read().await.is_some() {
            WorkspaceState::Open
        } else if self.partition_is_populated() {
            WorkspaceState::ClosedOnDisk
        } else {
            WorkspaceState::Empty
        }
    }

    /// Returns true once a handle has been bound (index created or opened).
    pub async fn is_open(&self) -> bool {
        self.handle.read().await.is_some()
    }

    async fn ensure_open(&self, dimension: usize) -> Result<(), AppError> {
        if self.handle.read().await.is_some() {
            return Ok(());
        }

        let mut guard = self.handle.write().await;
        if guard.is_some() {
            return Ok(());
        }

        std::fs::create_dir_all(self.partition_path())?;
        let db = connect(format!("rocksdb://{}", self.partition_path().display())).await?;
        db.use_ns("nexus").use_db(&self.workspace_id).await?;
        db.query(format!(
            "DEFINE INDEX IF NOT EXISTS idx_chunk_embedding ON chunk FIELDS embedding HNSW DIMENSION {dimension}"
        ))
        .await?;

        *guard = Some(db);
        Ok(())
    }

    /// Opens the handle for a read path only if the partition already has
    /// data on disk; otherwise leaves it unbound (query on an empty
    /// workspace must fail with `not_indexed`, not silently create one).
    async fn ensure_open_for_read(&self, dimension: usize) -> Result<bool, AppError> {
        if self.handle.read().await.is_some() {
            return Ok(true);
        }
        if !self.partition_is_populated() {
            return Ok(false);
        }
        self.ensure_open(dimension).await?;
        Ok(true)
    }

    /// Appends chunks (creating the partition on first call).
    pub async fn upsert_chunks(
        &self,
        chunks: &[(DocumentChunk, Vec<f32>)],
        dimension: usize,
    ) -> Result<(), AppError> {
        self.ensure_open(dimension).await?;
        let guard = self.handle.read().await;
        let db = guard.as_ref().expect("handle just ensured open");

        for (chunk, embedding) in chunks {
            let stored = StoredChunk {
                source: chunk.source.clone(),
                page: chunk.page,
                chunk_index: chunk.chunk_index,
                content: chunk.content.clone(),
                embedding: embedding.clone(),
            };
            let _: Option<StoredChunk> = db.create("chunk").content(stored).await?;
        }

        Ok(())
    }

    /// Retrieves the top-`k` chunks ranked by cosine similarity to
    /// `query_embedding`. Returns `None` if the workspace has never been
    /// indexed (caller should surface `not_indexed`).
    pub async fn search(
        &self,
        query_embedding: &[f32],
        k: usize,
        dimension: usize,
    ) -> Result<Option<Vec<(DocumentChunk, f64)>>, AppError> {
        if !self.ensure_open_for_read(dimension).await? {
            return Ok(None);
        }

        let guard = self.handle.read().await;
        let db = guard.as_ref().expect("handle just ensured open");

        let mut result = db
            .query(
                "SELECT *, vector::similarity::cosine(embedding, $query) AS score
                 FROM chunk
                 WHERE embedding <|$k,100|> $query
                 ORDER BY score DESC",
            )
            .bind(("query", query_embedding.to_vec()))
            .bind(("k", k as i64))
            .await?;

        #[derive(Deserialize)]
        struct Row {
            source: String,
            page: Option<u32>,
            chunk_index: usize,
            content: String,
            score: f64,
        }

        let rows: Vec<Row> = result.take(0)?;
        Ok(Some(
            rows.into_iter()
                .map(|r| {
                    (
                        DocumentChunk {
                            source: r.source,
                            page: r.page,
                            chunk_index: r.chunk_index,
                            content: r.content,
                        },
                        r.score,
                    )
                })
                .collect(),
        ))
    }

    /// Total chunk count, used to populate `HealthStatus.documents_indexed`.
    pub async fn chunk_count(&self) -> Result<usize, AppError> {
        let guard = self.handle.read().await;
        let Some(db) = guard.as_ref() else {
            return Ok(0);
        };
        let mut result = db.query("SELECT count() FROM chunk GROUP ALL").await?;
        #[derive(Deserialize)]
        struct Count {
            count: usize,
        }
        let rows: Vec<Count> = result.take(0)?;
        Ok(rows.first().map(|c| c.count).unwrap_or(0))
    }
}

/// One `VectorStore` per workspace id, guarded by an async mutex-protected
/// map with lazy, create-once-under-lock materialisation — the HTTP
/// surface's shared-resource policy.
pub struct VectorStoreRegistry {
    root: PathBuf,
    stores: RwLock<std::collections::HashMap<String, Arc<VectorStore>>>,
}

impl VectorStoreRegistry {
    pub fn new(chroma_root: impl Into<PathBuf>) -> Self {
        Self {
            root: chroma_root.into(),
            stores: RwLock::new(std::collections::HashMap::new()),
        }
    }

    pub async fn get_or_create(&self, workspace_id: &str) -> Arc<VectorStore> {
        if let Some(store) = self.stores.read().await.get(workspace_id) {
            return store.clone();
        }
        let mut guard = self.stores.write().await;
        if let Some(store) = guard.get(workspace_id) {
            return store.clone();
        }
        let store = Arc::new(VectorStore::new(self.root.clone(), workspace_id));
        guard.insert(workspace_id.to_string(), store.clone());
        store
    }

    /// Lists workspace ids with a populated partition directory on disk.
    pub fn list_partition_ids(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return Vec::new();
        };
        entries
            .filter_map(Result::ok)
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().into_string().ok())
            .collect()
    }
}

/// Polls `INFO FOR INDEX` until the HNSW index reports `status = "ready"`,
/// bounded by the caller via a timeout wrapper.
pub async fn wait_for_index_ready(db: &Surreal<Any>, index_name: &str, table: &str) {
    loop {
        if let Ok(mut res) = db.query(format!("INFO FOR INDEX {index_name} ON {table}")).await {
            let info: Result<Option<serde_json::Value>, _> = res.take(0);
            if let Ok(Some(value)) = info {
                if value.get("status").and_then(|s| s.as_str()) == Some("ready") {
                    return;
                }
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(INDEX_POLL_INTERVAL_MS)).await;
    }
}

pub fn partition_path_for(chroma_root: &Path, workspace_id: &str) -> PathBuf {
    chroma_root.join(workspace_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn chunk(source: &str, idx: usize, content: &str) -> DocumentChunk {
        DocumentChunk {
            source: source.to_string(),
            page: None,
            chunk_index: idx,
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn empty_workspace_state_before_any_index() {
        let dir = tempdir().expect("tempdir");
        let store = VectorStore::new(dir.path(), "ws1");
        assert_eq!(store.state().await, WorkspaceState::Empty);
    }

    #[tokio::test]
    async fn search_on_empty_workspace_returns_none() {
        let dir = tempdir().expect("tempdir");
        let store = VectorStore::new(dir.path(), "ws1");
        let result = store.search(&vec![0.0; 4], 3, 4).await.expect("search should not error");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn index_then_search_returns_chunks_ranked_by_similarity() {
        let dir = tempdir().expect("tempdir");
        let store = VectorStore::new(dir.path(), "ws1");

        let chunks = vec![
            (chunk("a.txt", 0, "machine learning is great"), vec![1.0, 0.0, 0.0, 0.0]),
            (chunk("a.txt", 1, "unrelated content"), vec![0.0, 1.0, 0.0, 0.0]),
        ];
        store.upsert_chunks(&chunks, 4).await.expect("upsert should succeed");

        assert_eq!(store.state().await, WorkspaceState::Open);

        let results = store
            .search(&vec![1.0, 0.0, 0.0, 0.0], 2, 4)
            .await
            .expect("search should succeed")
            .expect("workspace is indexed");
        assert!(!results.is_empty());
        assert_eq!(results[0].0.source, "a.txt");
    }

    #[tokio::test]
    async fn create_partition_dir_makes_workspace_visible_before_indexing() {
        let dir = tempdir().expect("tempdir");
        let registry = VectorStoreRegistry::new(dir.path());
        let store = registry.get_or_create("ws1").await;
        store.create_partition_dir().expect("partition dir should be created");
        assert!(registry.list_partition_ids().contains(&"ws1".to_string()));
    }

    #[tokio::test]
    async fn registry_returns_same_store_instance_for_same_workspace() {
        let dir = tempdir().expect("tempdir");
        let registry = VectorStoreRegistry::new(dir.path());
        let a = registry.get_or_create("ws1").await;
        let b = registry.get_or_create("ws1").await;
        assert!(Arc::ptr_eq(&a, &b));
    }
}
