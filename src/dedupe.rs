//! Duplicate detection (§4.2, C5).
//!
//! Checks, in order, returning on the first hit: file-path equality
//! (case-sensitive then case-insensitive), metadata (exact title+author,
//! exact title, exact `title_lower`, fuzzy title via Levenshtein ratio),
//! then content hash. A vector store that can't be reached is treated as
//! "no duplicate found" — ingestion must proceed, not fail.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::DocumentMetadata;
use crate::vector::VectorRepo;

/// Outcome of [`classify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateVerdict {
    pub is_duplicate: bool,
    pub existing_id: Option<String>,
    pub method: Option<String>,
}

impl DuplicateVerdict {
    fn none() -> Self {
        Self {
            is_duplicate: false,
            existing_id: None,
            method: None,
        }
    }

    fn hit(existing_id: String, method: &str) -> Self {
        Self {
            is_duplicate: true,
            existing_id: Some(existing_id),
            method: Some(method.to_string()),
        }
    }
}

pub struct DuplicateDetector {
    vector_repo: Arc<dyn VectorRepo>,
    fuzzy_threshold: u8,
}

impl DuplicateDetector {
    pub fn new(vector_repo: Arc<dyn VectorRepo>, fuzzy_threshold: u8) -> Self {
        Self {
            vector_repo,
            fuzzy_threshold,
        }
    }

    /// SHA-256 over whitespace-collapsed, lower-cased text.
    pub fn content_hash(text: &str) -> String {
        let normalized = crate::chunk::normalize_whitespace(text).to_lowercase();
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub async fn classify(&self, text: &str, metadata: &DocumentMetadata) -> DuplicateVerdict {
        if let Some(file_path) = &metadata.file_path {
            match self.check_path(file_path).await {
                Ok(Some(hit)) => return hit,
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "vector store unreachable during path duplicate check");
                    return DuplicateVerdict::none();
                }
            }
        }

        if let Some(title) = metadata.title.as_deref().filter(|t| !t.trim().is_empty()) {
            match self.check_metadata(title, metadata.author.as_deref(), metadata.title_lower().as_deref()).await {
                Ok(Some(hit)) => return hit,
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "vector store unreachable during metadata duplicate check");
                    return DuplicateVerdict::none();
                }
            }
        }

        let hash = Self::content_hash(text);
        match self.check_content_hash(&hash).await {
            Ok(Some(hit)) => hit,
            Ok(None) => DuplicateVerdict::none(),
            Err(e) => {
                tracing::warn!(error = %e, "vector store unreachable during content-hash duplicate check");
                DuplicateVerdict::none()
            }
        }
    }

    async fn check_path(&self, file_path: &str) -> anyhow::Result<Option<DuplicateVerdict>> {
        let normalized = normalize_path(file_path);

        let mut filter = HashMap::new();
        filter.insert("file_path".to_string(), normalized.clone());
        let exact = self.vector_repo.get_by_metadata(&filter).await.map_err(anyhow::Error::from)?;
        if let Some(m) = exact.first() {
            return Ok(Some(DuplicateVerdict::hit(m.id.clone(), "file_path")));
        }

        let all = self.vector_repo.get_by_metadata(&HashMap::new()).await.map_err(anyhow::Error::from)?;
        let needle = normalized.to_lowercase();
        for m in &all {
            if let Some(stored) = m.metadata.get("file_path") {
                if normalize_path(stored).to_lowercase() == needle {
                    return Ok(Some(DuplicateVerdict::hit(m.id.clone(), "file_path")));
                }
            }
        }

        Ok(None)
    }

    async fn check_metadata(
        &self,
        title: &str,
        author: Option<&str>,
        title_lower: Option<&str>,
    ) -> anyhow::Result<Option<DuplicateVerdict>> {
        if let Some(author) = author {
            let mut filter = HashMap::new();
            filter.insert("title".to_string(), title.to_string());
            filter.insert("author".to_string(), author.to_string());
            let hits = self.vector_repo.get_by_metadata(&filter).await.map_err(anyhow::Error::from)?;
            if let Some(m) = hits.first() {
                return Ok(Some(DuplicateVerdict::hit(m.id.clone(), "metadata")));
            }
        }

        let mut filter = HashMap::new();
        filter.insert("title".to_string(), title.to_string());
        let hits = self.vector_repo.get_by_metadata(&filter).await.map_err(anyhow::Error::from)?;
        if let Some(m) = hits.first() {
            return Ok(Some(DuplicateVerdict::hit(m.id.clone(), "metadata")));
        }

        if let Some(title_lower) = title_lower {
            let mut filter = HashMap::new();
            filter.insert("title_lower".to_string(), title_lower.to_string());
            let hits = self.vector_repo.get_by_metadata(&filter).await.map_err(anyhow::Error::from)?;
            if let Some(m) = hits.first() {
                return Ok(Some(DuplicateVerdict::hit(m.id.clone(), "metadata")));
            }
        }

        let all = self.vector_repo.get_by_metadata(&HashMap::new()).await.map_err(anyhow::Error::from)?;
        let title_lower_needle = title.to_lowercase();
        for m in &all {
            if let Some(existing_title) = m.metadata.get("title") {
                let similarity = strsim::normalized_levenshtein(&title_lower_needle, &existing_title.to_lowercase()) * 100.0;
                if similarity >= self.fuzzy_threshold as f64 {
                    return Ok(Some(DuplicateVerdict::hit(m.id.clone(), "metadata")));
                }
            }
        }

        Ok(None)
    }

    async fn check_content_hash(&self, hash: &str) -> anyhow::Result<Option<DuplicateVerdict>> {
        let mut filter = HashMap::new();
        filter.insert("hash".to_string(), hash.to_string());
        let hits = self.vector_repo.get_by_metadata(&filter).await.map_err(anyhow::Error::from)?;
        Ok(hits.first().map(|m| DuplicateVerdict::hit(m.id.clone(), "content_hash")))
    }
}

/// Normalizes path separators the way `os.path.normpath` does for the
/// common `./`, trailing-slash, and repeated-separator cases.
fn normalize_path(path: &str) -> String {
    let mut out = std::path::PathBuf::new();
    for component in std::path::Path::new(path).components() {
        out.push(component);
    }
    out.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Mutex;

    use crate::error::CoreResult;
    use crate::models::VectorMatch;

    #[derive(Default)]
    struct FakeVectorRepo {
        records: Mutex<Vec<VectorMatch>>,
    }

    #[async_trait]
    impl VectorRepo for FakeVectorRepo {
        async fn upsert(&self, _id: &str, _document: &str, _metadata: &HashMap<String, Value>) -> CoreResult<()> {
            Ok(())
        }

        async fn query(
            &self,
            _texts: &[String],
            _k: usize,
            _where_filter: Option<&HashMap<String, String>>,
        ) -> CoreResult<Vec<Vec<VectorMatch>>> {
            Ok(Vec::new())
        }

        async fn get_by_metadata(&self, where_filter: &HashMap<String, String>) -> CoreResult<Vec<VectorMatch>> {
            let records = self.records.lock().unwrap();
            Ok(records
                .iter()
                .filter(|r| where_filter.iter().all(|(k, v)| r.metadata.get(k) == Some(v)))
                .cloned()
                .collect())
        }

        async fn check_health(&self) -> (bool, String) {
            (true, "ok".to_string())
        }

        async fn repair(&self) -> (bool, String) {
            (true, "ok".to_string())
        }
    }

    fn record(id: &str, metadata: &[(&str, &str)]) -> VectorMatch {
        VectorMatch {
            id: id.to_string(),
            document: String::new(),
            metadata: metadata.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            distance: 0.0,
        }
    }

    fn metadata_with(file_path: Option<&str>, title: Option<&str>) -> DocumentMetadata {
        let mut m = DocumentMetadata::default();
        m.file_path = file_path.map(|s| s.to_string());
        m.title = title.map(|s| s.to_string());
        m
    }

    #[tokio::test]
    async fn detects_duplicate_by_exact_path() {
        let repo = Arc::new(FakeVectorRepo {
            records: Mutex::new(vec![record("doc-1", &[("file_path", "a/b.txt")])]),
        });
        let detector = DuplicateDetector::new(repo, 90);
        let verdict = detector.classify("text", &metadata_with(Some("a/b.txt"), None)).await;
        assert!(verdict.is_duplicate);
        assert_eq!(verdict.method.as_deref(), Some("file_path"));
        assert_eq!(verdict.existing_id.as_deref(), Some("doc-1"));
    }

    #[tokio::test]
    async fn detects_duplicate_by_fuzzy_title() {
        let repo = Arc::new(FakeVectorRepo {
            records: Mutex::new(vec![record("doc-2", &[("title", "Graph RAG Systems")])]),
        });
        let detector = DuplicateDetector::new(repo, 80);
        let verdict = detector.classify("text", &metadata_with(None, Some("GraphRAG Systems"))).await;
        assert!(verdict.is_duplicate);
        assert_eq!(verdict.method.as_deref(), Some("metadata"));
    }

    #[tokio::test]
    async fn detects_duplicate_by_content_hash() {
        let repo = Arc::new(FakeVectorRepo {
            records: Mutex::new(vec![record(
                "doc-3",
                &[("hash", &DuplicateDetector::content_hash("Some   repeated text."))],
            )]),
        });
        let detector = DuplicateDetector::new(repo, 90);
        let verdict = detector.classify("Some repeated text.", &metadata_with(None, None)).await;
        assert!(verdict.is_duplicate);
        assert_eq!(verdict.method.as_deref(), Some("content_hash"));
    }

    #[tokio::test]
    async fn no_match_is_not_a_duplicate() {
        let repo = Arc::new(FakeVectorRepo::default());
        let detector = DuplicateDetector::new(repo, 90);
        let verdict = detector.classify("brand new text", &metadata_with(None, None)).await;
        assert!(!verdict.is_duplicate);
    }
}
