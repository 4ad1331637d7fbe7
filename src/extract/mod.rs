//! Document ingestion: folder indexing, per-file text extraction, and
//! topic-candidate extraction.
//!
//! Extraction is best-effort throughout. A file that cannot be downloaded
//! or parsed yields no excerpt and no topics, is recorded as such, and
//! never aborts the batch.

pub mod heuristics;
pub mod notebook;
pub mod pdf;

pub use heuristics::{heuristic_topics, is_noise};
pub use notebook::extract_notebook_text;
pub use pdf::extract_pdf_text;

use serde::{Deserialize, Serialize};

use crate::config::LimitsConfig;
use crate::db::{Database, IndexedFile};
use crate::error::Result;
use crate::llm::{Completion, CompletionRequest};
use crate::remote::{list_folder_recursive, FileStore};

/// Cap on the excerpt sent to the model for topic extraction.
const MODEL_EXCERPT_CAP: usize = 6_000;

/// Declared document type, derived from name and MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Notebook,
    Pdf,
    Other,
}

impl FileKind {
    pub fn detect(name: &str, mime_type: &str) -> Self {
        let name = name.to_lowercase();
        if mime_type == "application/x-ipynb+json" || name.ends_with(".ipynb") {
            FileKind::Notebook
        } else if mime_type == "application/pdf" || name.ends_with(".pdf") {
            FileKind::Pdf
        } else {
            FileKind::Other
        }
    }
}

/// Extract plain text from raw bytes for a declared type. Never fails;
/// unextractable input yields an empty string.
pub fn extract_text(bytes: &[u8], kind: FileKind, limits: &LimitsConfig) -> String {
    match kind {
        FileKind::Notebook => {
            extract_notebook_text(bytes, limits.notebook_line_cap, limits.excerpt_budget)
        }
        FileKind::Pdf => extract_pdf_text(bytes, limits.excerpt_budget),
        FileKind::Other => String::new(),
    }
}

/// Topic candidates for one file. The model list is preferred when
/// non-empty; the heuristic list is stored alongside either way.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedTopics {
    pub topics: Vec<String>,
    pub heuristic: Vec<String>,
    pub source: String,
}

/// Run both extraction strategies over an excerpt.
pub async fn extract_topics<C: Completion>(client: &C, excerpt: &str) -> ExtractedTopics {
    let heuristic = heuristic_topics(excerpt);

    if client.is_configured() && !excerpt.trim().is_empty() {
        match model_topics(client, excerpt).await {
            Ok(topics) if !topics.is_empty() => {
                return ExtractedTopics {
                    topics,
                    heuristic,
                    source: "model".to_string(),
                };
            }
            Ok(_) => tracing::debug!("model returned no topics, falling back to heuristics"),
            Err(e) => tracing::warn!("model topic extraction failed, using heuristics: {e}"),
        }
    }

    ExtractedTopics {
        topics: heuristic.clone(),
        heuristic,
        source: "heuristic".to_string(),
    }
}

async fn model_topics<C: Completion>(client: &C, excerpt: &str) -> Result<Vec<String>> {
    let capped = notebook::truncate_chars(excerpt.to_string(), MODEL_EXCERPT_CAP);
    let prompt = format!(
        "Extract the main study topics from this course material. Return ONLY a JSON \
         array of 8-20 concise topic strings, nothing else.\n\n---\n{capped}"
    );
    let req = CompletionRequest::new(
        "You extract concise topic lists from study material.",
        prompt,
    )
    .with_budget(300, 0.3);

    let completed = client.complete(&req).await?;
    let mut topics = parse_loose_string_array(&completed.text).unwrap_or_default();
    dedup_case_insensitive(&mut topics);
    Ok(topics)
}

/// Parse a JSON array from model output, recovering the first well-formed
/// array substring when the response has prose around it.
pub fn parse_loose_array(text: &str) -> Option<Vec<serde_json::Value>> {
    if let Ok(values) = serde_json::from_str::<Vec<serde_json::Value>>(text.trim()) {
        return Some(values);
    }

    let bytes = text.as_bytes();
    for start in 0..bytes.len() {
        if bytes[start] != b'[' {
            continue;
        }
        for end in start + 1..bytes.len() {
            if bytes[end] != b']' {
                continue;
            }
            if let Ok(values) =
                serde_json::from_str::<Vec<serde_json::Value>>(&text[start..=end])
            {
                return Some(values);
            }
        }
    }
    None
}

/// Loose parse specialized to string elements; non-strings are dropped.
pub fn parse_loose_string_array(text: &str) -> Option<Vec<String>> {
    parse_loose_array(text).map(|values| {
        values
            .into_iter()
            .filter_map(|v| v.as_str().map(|s| s.trim().to_string()))
            .filter(|s| !s.is_empty())
            .collect()
    })
}

fn dedup_case_insensitive(topics: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    topics.retain(|t| seen.insert(crate::cache::normalize_key(t)));
}

/// Outcome of extracting one file; errors stay attached here instead of
/// aborting the batch.
#[derive(Debug, Clone)]
pub struct FileExtractionResult {
    pub file_id: String,
    pub name: String,
    pub topic_count: usize,
    pub excerpt_chars: usize,
    pub error: Option<String>,
}

/// Index a folder: BFS-list it and upsert file metadata. Extraction
/// columns are untouched.
pub async fn index_folder<S: FileStore>(
    db: &Database,
    store: &S,
    folder_id: &str,
    item_cap: usize,
) -> Result<usize> {
    let listed = list_folder_recursive(store, folder_id, item_cap).await?;
    let now = chrono::Utc::now().to_rfc3339();

    for entry in &listed {
        db.upsert_indexed_file(&IndexedFile {
            file_id: entry.file.id.clone(),
            folder_id: folder_id.to_string(),
            name: entry.file.name.clone(),
            mime_type: entry.file.mime_type.clone(),
            modified_time: entry.file.modified_time.clone(),
            size: entry.file.size,
            path: entry.path.clone(),
            parent_id: entry.file.parent_id.clone(),
            extracted_topics_json: None,
            text_excerpt: None,
            extracted_at: None,
            indexed_at: now.clone(),
        })?;
    }

    tracing::info!(folder = folder_id, files = listed.len(), "folder indexed");
    Ok(listed.len())
}

/// Extract one already-indexed file: download, extract text, derive
/// topics, persist. Download failures leave the file unprocessed so a
/// later run can retry; empty extractions are stored and mark the file
/// done.
pub async fn extract_file<C: Completion, S: FileStore>(
    db: &Database,
    client: &C,
    store: &S,
    file: &IndexedFile,
    limits: &LimitsConfig,
) -> FileExtractionResult {
    let bytes = match store.download(&file.file_id).await {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!(file = %file.name, "download failed: {e}");
            return FileExtractionResult {
                file_id: file.file_id.clone(),
                name: file.name.clone(),
                topic_count: 0,
                excerpt_chars: 0,
                error: Some(e.to_string()),
            };
        }
    };

    let kind = FileKind::detect(&file.name, &file.mime_type);
    let excerpt = extract_text(&bytes, kind, limits);
    let extracted = if excerpt.is_empty() {
        ExtractedTopics::default()
    } else {
        extract_topics(client, &excerpt).await
    };

    let topic_count = extracted.topics.len();
    let topics_json = serde_json::to_string(&extracted).unwrap_or_else(|_| "{}".to_string());
    let error = db
        .store_extraction(&file.file_id, &excerpt, &topics_json)
        .err()
        .map(|e| e.to_string());

    FileExtractionResult {
        file_id: file.file_id.clone(),
        name: file.name.clone(),
        topic_count,
        excerpt_chars: excerpt.chars().count(),
        error,
    }
}

/// Extract every unprocessed file in a folder. With `force`, files with
/// existing output are re-extracted too.
pub async fn extract_pending<C: Completion, S: FileStore>(
    db: &Database,
    client: &C,
    store: &S,
    folder_id: &str,
    force: bool,
    limits: &LimitsConfig,
) -> Result<Vec<FileExtractionResult>> {
    let pending = db.pending_files(folder_id, force)?;
    let mut results = Vec::with_capacity(pending.len());
    for file in &pending {
        results.push(extract_file(db, client, store, file, limits).await);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guidance::test_support::MockCompletion;
    use crate::remote::test_support::MemoryStore;

    fn notebook_bytes(markdown: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "cells": [ { "cell_type": "markdown", "source": [markdown] } ]
        }))
        .unwrap()
    }

    #[test]
    fn test_file_kind_detection() {
        assert_eq!(FileKind::detect("a.ipynb", "application/octet-stream"), FileKind::Notebook);
        assert_eq!(FileKind::detect("a.PDF", ""), FileKind::Pdf);
        assert_eq!(FileKind::detect("a.bin", "application/pdf"), FileKind::Pdf);
        assert_eq!(FileKind::detect("a.txt", "text/plain"), FileKind::Other);
    }

    #[test]
    fn test_loose_array_parse() {
        assert_eq!(
            parse_loose_string_array(r#"["a", "b"]"#).unwrap(),
            vec!["a", "b"]
        );
        assert_eq!(
            parse_loose_string_array("Here you go:\n[\"a\", \"b\"]\nEnjoy!").unwrap(),
            vec!["a", "b"]
        );
        assert!(parse_loose_string_array("no array here").is_none());
        // Non-string elements are dropped, not fatal.
        assert_eq!(parse_loose_string_array(r#"[1, "a"]"#).unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_model_topics_preferred_heuristic_stored() {
        let client = MockCompletion::replying(r#"["Linear Regression", "Gradient Boosting"]"#);
        let extracted = extract_topics(&client, "# Heuristic Heading\nbody").await;
        assert_eq!(extracted.source, "model");
        assert_eq!(extracted.topics, vec!["Linear Regression", "Gradient Boosting"]);
        assert_eq!(extracted.heuristic, vec!["Heuristic Heading"]);
    }

    #[tokio::test]
    async fn test_unparseable_model_reply_falls_back_to_heuristics() {
        let client = MockCompletion::replying("sorry, no JSON today");
        let extracted = extract_topics(&client, "# Heuristic Heading\nbody").await;
        assert_eq!(extracted.source, "heuristic");
        assert_eq!(extracted.topics, vec!["Heuristic Heading"]);
    }

    #[tokio::test]
    async fn test_batch_survives_corrupt_file() {
        let db = Database::open_memory().unwrap();
        let client = MockCompletion::unconfigured();
        let mut store = MemoryStore::default();

        for i in 0..4 {
            store.add_file(
                "root",
                &format!("good{i}"),
                &format!("good{i}.ipynb"),
                "application/x-ipynb+json",
                &notebook_bytes("# Topic One"),
            );
        }
        store.add_file("root", "bad", "bad.ipynb", "application/x-ipynb+json", b"{corrupt");

        index_folder(&db, &store, "root", 100).await.unwrap();
        let results = extract_pending(&db, &client, &store, "root", false, &LimitsConfig::default())
            .await
            .unwrap();

        assert_eq!(results.len(), 5);
        let ok: Vec<_> = results.iter().filter(|r| r.topic_count > 0).collect();
        assert_eq!(ok.len(), 4);
        let bad = results.iter().find(|r| r.file_id == "bad").unwrap();
        assert_eq!(bad.topic_count, 0);
        assert_eq!(bad.excerpt_chars, 0);

        // Everything is marked processed, including the empty extraction.
        assert!(db.pending_files("root", false).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_extraction_idempotent_unless_forced() {
        let db = Database::open_memory().unwrap();
        let client = MockCompletion::unconfigured();
        let mut store = MemoryStore::default();
        store.add_file(
            "root",
            "f1",
            "a.ipynb",
            "application/x-ipynb+json",
            &notebook_bytes("# A"),
        );

        index_folder(&db, &store, "root", 100).await.unwrap();
        let limits = LimitsConfig::default();
        let first = extract_pending(&db, &client, &store, "root", false, &limits).await.unwrap();
        assert_eq!(first.len(), 1);
        let second = extract_pending(&db, &client, &store, "root", false, &limits).await.unwrap();
        assert!(second.is_empty());
        let forced = extract_pending(&db, &client, &store, "root", true, &limits).await.unwrap();
        assert_eq!(forced.len(), 1);
    }
}
