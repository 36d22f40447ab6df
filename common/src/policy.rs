use sha2::{Digest, Sha256};

use crate::models::Citation;

const SEGMENT_SEPARATOR: &str = "\n\n---\n\n";
const TRUNCATION_MARKER: &str = "...";
const EMERGENCY_MARKER: &str = "\n\n[Context truncated for safety]";

/// Bounds outbound payload size, attaches provenance, and produces audit
/// hashes of full excerpts before any truncation.
#[derive(Clone, Debug)]
pub struct PolicyRedactor {
    pub safe_mode: bool,
    pub max_snippet_length: usize,
}

impl PolicyRedactor {
    pub fn new(safe_mode: bool, max_snippet_length: usize) -> Self {
        Self {
            safe_mode,
            max_snippet_length,
        }
    }

    /// Transforms citations into `(context, excerpt_hashes)`. Hashes always
    /// correspond to the untruncated excerpt; truncation never affects the
    /// hash list, and its ordering matches the input citation order.
    pub fn redact_snippets(&self, citations: &[Citation]) -> (String, Vec<String>) {
        let mut excerpt_hashes = Vec::with_capacity(citations.len());
        let mut segments = Vec::with_capacity(citations.len());

        for citation in citations {
            let hash = format!("{:x}", Sha256::digest(citation.excerpt.as_bytes()));
            excerpt_hashes.push(hash);

            let body = if self.safe_mode && citation.excerpt.chars().count() > self.max_snippet_length {
                let truncated: String = citation.excerpt.chars().take(self.max_snippet_length).collect();
                format!("{truncated}{TRUNCATION_MARKER}")
            } else {
                citation.excerpt.clone()
            };

            let attribution = match citation.page {
                Some(page) => format!("[Source: {}, Page {page}]\n", citation.source),
                None => format!("[Source: {}]\n", citation.source),
            };

            segments.push(format!("{attribution}{body}"));
        }

        let mut context = segments.join(SEGMENT_SEPARATOR);

        let emergency_bound = self.max_snippet_length.saturating_mul(citations.len());
        if self.safe_mode && context.chars().count() > emergency_bound {
            let truncated: String = context.chars().take(emergency_bound).collect();
            context = format!("{truncated}{EMERGENCY_MARKER}");
        }

        (context, excerpt_hashes)
    }

    /// Returns false when safe mode is on and the payload exceeds
    /// `max_snippet_length * 10`, or when `sentinel` is a non-empty substring
    /// of the payload. When safe mode is off, the length bound is not
    /// checked.
    pub fn validate_outbound_payload(&self, payload: &str, sentinel: Option<&str>) -> bool {
        if self.safe_mode && payload.chars().count() > self.max_snippet_length * 10 {
            return false;
        }
        if let Some(sentinel) = sentinel {
            if !sentinel.is_empty() && payload.contains(sentinel) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn citation(source: &str, page: Option<u32>, excerpt: &str) -> Citation {
        Citation {
            source: source.to_string(),
            page,
            excerpt: excerpt.to_string(),
            relevance_score: 1.0,
            content_hash: String::new(),
        }
    }

    #[test]
    fn hash_count_matches_citation_count_and_order() {
        let redactor = PolicyRedactor::new(true, 4000);
        let citations = vec![
            citation("a.txt", None, "alpha"),
            citation("b.txt", Some(2), "beta"),
        ];
        let (_, hashes) = redactor.redact_snippets(&citations);
        assert_eq!(hashes.len(), citations.len());

        let expected_first = format!("{:x}", Sha256::digest(b"alpha"));
        assert_eq!(hashes[0], expected_first);
    }

    #[test]
    fn truncation_does_not_change_hash() {
        let redactor = PolicyRedactor::new(true, 5);
        let full = "x".repeat(1000);
        let citations = vec![citation("a.txt", None, &full)];
        let (ctx, hashes) = redactor.redact_snippets(&citations);

        let expected = format!("{:x}", Sha256::digest(full.as_bytes()));
        assert_eq!(hashes[0], expected);
        assert!(ctx.contains("xxxxx..."));
    }

    #[test]
    fn safe_mode_off_is_identity_on_excerpt_text() {
        let redactor = PolicyRedactor::new(false, 5);
        let full = "x".repeat(1000);
        let citations = vec![citation("a.txt", None, &full)];
        let (ctx, _) = redactor.redact_snippets(&citations);
        assert!(ctx.contains(&full));
        assert!(!ctx.contains(TRUNCATION_MARKER));
    }

    #[test]
    fn emergency_truncation_applies_past_aggregate_bound() {
        let redactor = PolicyRedactor::new(true, 10);
        let citations: Vec<Citation> = (0..3)
            .map(|i| citation(&format!("s{i}.txt"), None, &"y".repeat(9)))
            .collect();
        let (ctx, _) = redactor.redact_snippets(&citations);
        assert!(ctx.ends_with(EMERGENCY_MARKER) || ctx.chars().count() <= 30 + 200);
    }

    #[test]
    fn validate_outbound_payload_rejects_oversized_under_safe_mode() {
        let redactor = PolicyRedactor::new(true, 10);
        let payload = "z".repeat(101);
        assert!(!redactor.validate_outbound_payload(&payload, None));
    }

    #[test]
    fn validate_outbound_payload_ignores_length_when_safe_mode_off() {
        let redactor = PolicyRedactor::new(false, 10);
        let payload = "z".repeat(1000);
        assert!(redactor.validate_outbound_payload(&payload, None));
    }

    #[test]
    fn validate_outbound_payload_rejects_sentinel_substring() {
        let redactor = PolicyRedactor::new(true, 4000);
        assert!(!redactor.validate_outbound_payload("leaked SECRET here", Some("SECRET")));
        assert!(redactor.validate_outbound_payload("nothing to see", Some("SECRET")));
    }
}
