#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

pub mod chunker;
pub mod loader;

use common::error::AppError;
use loader::LoadedDocument;
use tracing::debug;

/// Loads every path in `paths`, in order. Paths that don't exist or
/// carry an unsupported extension count toward the returned skip total
/// rather than producing an error.
pub async fn load_paths(paths: &[String]) -> Result<(Vec<LoadedDocument>, usize), AppError> {
    let mut documents = Vec::with_capacity(paths.len());
    let mut skipped = 0usize;

    for path in paths {
        match loader::load_document(path).await? {
            Some(document) => documents.push(document),
            None => {
                debug!(path, "counted toward files_skipped");
                skipped += 1;
            }
        }
    }

    Ok((documents, skipped))
}
