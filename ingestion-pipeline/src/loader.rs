use std::path::Path;

use chrono::Utc;
use common::error::AppError;
use common::models::DocumentSource;
use sha2::{Digest, Sha256};
use tracing::debug;

/// A raw document loaded from disk, paired with the source metadata
/// recorded before any chunking happens.
pub struct LoadedDocument {
    pub source: DocumentSource,
    pub text: String,
}

const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "txt", "md"];

/// Loads a single path, returning `Ok(None)` when the path does not exist
/// or its extension is unsupported (the caller counts this toward
/// `files_skipped`, not an error).
pub async fn load_document(path: &str) -> Result<Option<LoadedDocument>, AppError> {
    let file_path = Path::new(path);
    if !file_path.exists() {
        debug!(path, "skipping: path does not exist");
        return Ok(None);
    }

    let extension = file_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    let Some(extension) = extension else {
        debug!(path, "skipping: no file extension");
        return Ok(None);
    };
    if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        debug!(path, extension, "skipping: unsupported extension");
        return Ok(None);
    }

    let metadata = tokio::fs::metadata(file_path).await?;
    let mtime = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);

    let bytes = tokio::fs::read(file_path).await?;
    let text = if extension == "pdf" {
        extract_pdf_text(path, &bytes).await?
    } else {
        String::from_utf8_lossy(&bytes).into_owned()
    };

    let file_hash = format!("{:x}", Sha256::digest(&bytes));

    Ok(Some(LoadedDocument {
        source: DocumentSource {
            file_path: path.to_string(),
            file_hash,
            file_mtime: mtime,
            indexed_at: Utc::now(),
        },
        text,
    }))
}

/// Extracts text from a PDF. CPU-bound, so run on the blocking pool like
/// every other synchronous extraction step in this pipeline.
async fn extract_pdf_text(path: &str, bytes: &[u8]) -> Result<String, AppError> {
    let owned = bytes.to_vec();
    let path = path.to_string();
    tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text_from_mem(&owned)
            .map_err(|err| AppError::Unrecoverable(format!("pdf extraction failed for {path}: {err}")))
    })
    .await
    .map_err(|err| AppError::Unrecoverable(format!("pdf extraction task panicked: {err}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[tokio::test]
    async fn missing_path_is_skipped_not_an_error() {
        let result = load_document("/nonexistent/path/does-not-exist.txt").await;
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn unsupported_extension_is_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("notes.docx");
        std::fs::File::create(&path).expect("create file").write_all(b"hi").unwrap();
        let result = load_document(path.to_str().unwrap()).await;
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn txt_file_loads_with_hash_and_metadata() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("doc.txt");
        std::fs::File::create(&path)
            .expect("create file")
            .write_all(b"hello world")
            .unwrap();

        let loaded = load_document(path.to_str().unwrap())
            .await
            .expect("should not error")
            .expect("should not be skipped");
        assert_eq!(loaded.text, "hello world");
        assert_eq!(loaded.source.file_hash, format!("{:x}", Sha256::digest(b"hello world")));
    }
}
