//! Stable identifier minting (§4.11).
//!
//! Random suffixes exist only to avoid collisions across independent runs;
//! normalized-name deduplication in [`crate::graph`] means a concept's final
//! id is whichever one is already in the store when a match is found.

use uuid::Uuid;

/// `"doc-" + UUIDv4`.
pub fn new_document_id() -> String {
    format!("doc-{}", Uuid::new_v4())
}

/// `"chunk-" + document_id + "-" + chunk_index + "-" + 8 hex chars of a UUIDv4`.
pub fn new_chunk_id(document_id: &str, chunk_index: i64) -> String {
    format!("chunk-{document_id}-{chunk_index}-{}", short_hex())
}

/// `"job-" + UUIDv4`.
pub fn new_job_id() -> String {
    format!("job-{}", Uuid::new_v4())
}

/// `"concept-" + source_tag + "-" + slug(name) + "-" + 8 hex chars of a UUIDv4`.
pub fn new_concept_id(source_tag: &str, name: &str) -> String {
    format!("concept-{source_tag}-{}-{}", slugify(name), short_hex())
}

fn short_hex() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// `lower(name)` with runs of non-alphanumeric characters collapsed to `-`.
pub fn slugify(name: &str) -> String {
    let lower = name.to_lowercase();
    let mut slug = String::with_capacity(lower.len());
    let mut last_was_sep = false;
    for ch in lower.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
            last_was_sep = false;
        } else if !last_was_sep {
            slug.push('-');
            last_was_sep = true;
        }
    }
    slug.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_id_has_prefix() {
        let id = new_document_id();
        assert!(id.starts_with("doc-"));
    }

    #[test]
    fn chunk_id_embeds_document_and_index() {
        let id = new_chunk_id("doc-abc", 3);
        assert!(id.starts_with("chunk-doc-abc-3-"));
        assert_eq!(id.rsplit('-').next().unwrap().len(), 8);
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Neural Networks!!"), "neural-networks");
        assert_eq!(slugify("C++ Programming"), "c-programming");
        assert_eq!(slugify("  leading  "), "leading");
    }

    #[test]
    fn concept_id_uses_slug() {
        let id = new_concept_id("llm", "Neural Networks");
        assert!(id.starts_with("concept-llm-neural-networks-"));
    }

    #[test]
    fn ids_are_unique_across_calls() {
        assert_ne!(new_document_id(), new_document_id());
        assert_ne!(new_chunk_id("d", 0), new_chunk_id("d", 0));
    }
}
