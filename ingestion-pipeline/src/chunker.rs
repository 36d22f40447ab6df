use common::models::DocumentChunk;
use text_splitter::TextSplitter;

/// Splits `text` into ordered chunks using the configured window and
/// stride complement, producing `DocumentChunk`s tagged with `source`
/// and an ascending `chunk_index`.
pub fn chunk_text(source: &str, text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<DocumentChunk> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let lower = chunk_size.saturating_sub(chunk_overlap).max(1);
    let splitter = TextSplitter::new(lower..chunk_size.max(lower + 1));

    splitter
        .chunks(text)
        .enumerate()
        .map(|(chunk_index, content)| DocumentChunk {
            source: source.to_string(),
            page: None,
            chunk_index,
            content: content.to_string(),
        })
        .collect()
}
