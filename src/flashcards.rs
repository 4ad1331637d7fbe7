//! Flashcard deck compilation, grounded strictly in stored excerpts.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::LimitsConfig;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::extract::{self, parse_loose_array};
use crate::llm::{Completion, CompletionRequest};
use crate::remote::FileStore;

/// Deck kind stored with every compilation run.
pub const DECK_KIND: &str = "grounded";

/// Default cards requested per file; overridable via the
/// `flashcards_per_file` setting.
const DEFAULT_CARDS_PER_FILE: usize = 6;

/// One flashcard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flashcard {
    pub question: String,
    pub answer: String,
    pub difficulty: String,
    pub source: String,
}

/// Result of one deck compilation.
#[derive(Debug, Clone)]
pub struct DeckSummary {
    pub deck_id: i64,
    pub total_cards: usize,
    /// (file name, cards contributed).
    pub per_file: Vec<(String, usize)>,
}

/// Compile a flashcard deck for a folder from the most recently processed
/// files. Files missing an excerpt are backfilled inline through the
/// store when one is provided, bounded by the file cap.
pub async fn compile_flashcards<C: Completion, S: FileStore>(
    db: &Database,
    client: &C,
    store: Option<&S>,
    folder_id: &str,
    limits: &LimitsConfig,
) -> Result<DeckSummary> {
    if let Some(store) = store {
        let pending = db.pending_files(folder_id, false)?;
        for file in pending.iter().take(limits.flashcard_max_files) {
            extract::extract_file(db, client, store, file, limits).await;
        }
    }

    let files = db.recent_extracted_files(folder_id, limits.flashcard_max_files)?;
    if files.is_empty() {
        return Err(Error::not_found("processed files for folder"));
    }

    let per_file_cap = db
        .get_setting("flashcards_per_file")?
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_CARDS_PER_FILE);

    let mut deck: Vec<Flashcard> = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut per_file = Vec::new();

    for file in &files {
        if deck.len() >= limits.flashcard_max_cards {
            break;
        }
        let Some(excerpt) = file.text_excerpt.as_deref().filter(|e| !e.trim().is_empty())
        else {
            per_file.push((file.name.clone(), 0));
            continue;
        };

        let cards = match request_cards(client, &file.name, excerpt, per_file_cap).await {
            Ok(cards) => cards,
            Err(e) => {
                tracing::warn!(file = %file.name, "flashcard generation failed: {e}");
                per_file.push((file.name.clone(), 0));
                continue;
            }
        };

        let mut added = 0;
        for card in cards {
            if deck.len() >= limits.flashcard_max_cards {
                break;
            }
            let key = (card.question.to_lowercase(), card.answer.to_lowercase());
            if seen.insert(key) {
                deck.push(card);
                added += 1;
            }
        }
        per_file.push((file.name.clone(), added));
    }

    if deck.is_empty() {
        return Err(Error::Parse("no flashcards could be generated".to_string()));
    }

    let deck_json = serde_json::to_string(&deck)?;
    let deck_id = db.insert_deck(folder_id, DECK_KIND, &deck_json)?;
    tracing::info!(deck_id, cards = deck.len(), "flashcard deck compiled");

    Ok(DeckSummary {
        deck_id,
        total_cards: deck.len(),
        per_file,
    })
}

async fn request_cards<C: Completion>(
    client: &C,
    file_name: &str,
    excerpt: &str,
    cap: usize,
) -> Result<Vec<Flashcard>> {
    let prompt = format!(
        "Create up to {cap} flashcards from the study material below. Use ONLY facts \
         stated in the material; do not add outside knowledge. If the material does not \
         support a card, skip it rather than inventing one.\n\
         Return ONLY a JSON array of objects with keys \"question\", \"answer\", \
         \"difficulty\" (easy|medium|hard) and \"source\".\n\n\
         Source file: {file_name}\n---\n{excerpt}"
    );
    let req = CompletionRequest::new(
        "You write precise flashcards grounded strictly in provided material.",
        prompt,
    )
    .with_budget(800, 0.3);

    let completed = client.complete(&req).await?;
    Ok(parse_cards(&completed.text, file_name))
}

/// Parse a loose JSON array of card objects; malformed entries are
/// dropped, never fatal.
pub fn parse_cards(text: &str, default_source: &str) -> Vec<Flashcard> {
    let Some(values) = parse_loose_array(text) else {
        return Vec::new();
    };

    values
        .into_iter()
        .filter_map(|v| {
            let question = v["question"].as_str()?.trim().to_string();
            let answer = v["answer"].as_str()?.trim().to_string();
            if question.is_empty() || answer.is_empty() {
                return None;
            }
            let difficulty = match v["difficulty"].as_str().unwrap_or("medium") {
                d @ ("easy" | "medium" | "hard") => d,
                _ => "medium",
            }
            .to_string();
            let source = v["source"]
                .as_str()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(default_source)
                .to_string();
            Some(Flashcard {
                question,
                answer,
                difficulty,
                source,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guidance::test_support::MockCompletion;
    use crate::remote::test_support::MemoryStore;

    fn add_extracted_file(db: &Database, file_id: &str, name: &str, excerpt: &str) {
        db.upsert_indexed_file(&crate::db::IndexedFile {
            file_id: file_id.to_string(),
            folder_id: "folder1".to_string(),
            name: name.to_string(),
            mime_type: "application/pdf".to_string(),
            modified_time: None,
            size: 1,
            path: name.to_string(),
            parent_id: None,
            extracted_topics_json: None,
            text_excerpt: None,
            extracted_at: None,
            indexed_at: chrono::Utc::now().to_rfc3339(),
        })
        .unwrap();
        db.store_extraction(file_id, excerpt, "{}").unwrap();
    }

    #[test]
    fn test_parse_cards_defensive() {
        let text = r#"Sure! ["not an object", {"question": "Q1", "answer": "A1", "difficulty": "weird"}, {"question": "", "answer": "x"}]"#;
        let cards = parse_cards(text, "file.pdf");
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].question, "Q1");
        assert_eq!(cards[0].difficulty, "medium");
        assert_eq!(cards[0].source, "file.pdf");
    }

    #[tokio::test]
    async fn test_identical_cards_deduplicated_across_files() {
        let db = Database::open_memory().unwrap();
        add_extracted_file(&db, "f1", "a.pdf", "excerpt a");
        add_extracted_file(&db, "f2", "b.pdf", "excerpt b");

        let client = MockCompletion::replying(
            r#"[{"question": "What is SQL?", "answer": "A query language", "difficulty": "easy", "source": "x"}]"#,
        );
        let summary = compile_flashcards::<_, MemoryStore>(
            &db,
            &client,
            None,
            "folder1",
            &LimitsConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(summary.total_cards, 1);
        assert_eq!(client.call_count(), 2);

        let deck = db.latest_deck("folder1", DECK_KIND).unwrap().unwrap();
        let cards: Vec<Flashcard> = serde_json::from_str(&deck.deck_json).unwrap();
        assert_eq!(cards.len(), 1);
    }

    #[tokio::test]
    async fn test_total_card_cap() {
        let db = Database::open_memory().unwrap();
        add_extracted_file(&db, "f1", "a.pdf", "excerpt");

        let many: Vec<serde_json::Value> = (0..20)
            .map(|i| {
                serde_json::json!({
                    "question": format!("Q{i}"), "answer": format!("A{i}"),
                    "difficulty": "easy", "source": "a.pdf"
                })
            })
            .collect();
        let client = MockCompletion::replying(&serde_json::to_string(&many).unwrap());

        let limits = LimitsConfig {
            flashcard_max_cards: 5,
            ..LimitsConfig::default()
        };
        let summary =
            compile_flashcards::<_, MemoryStore>(&db, &client, None, "folder1", &limits)
                .await
                .unwrap();
        assert_eq!(summary.total_cards, 5);
    }

    #[tokio::test]
    async fn test_compiles_with_per_file_setting() {
        let db = Database::open_memory().unwrap();
        db.set_setting("flashcards_per_file", "3").unwrap();
        add_extracted_file(&db, "f1", "a.pdf", "excerpt");
        let client = MockCompletion::replying(
            r#"[{"question": "Q", "answer": "A", "difficulty": "easy", "source": "a.pdf"}]"#,
        );
        let summary = compile_flashcards::<_, MemoryStore>(
            &db,
            &client,
            None,
            "folder1",
            &LimitsConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(summary.total_cards, 1);
        assert_eq!(summary.per_file, vec![("a.pdf".to_string(), 1)]);
    }

    #[tokio::test]
    async fn test_no_processed_files_is_not_found() {
        let db = Database::open_memory().unwrap();
        let client = MockCompletion::replying("[]");
        let result = compile_flashcards::<_, MemoryStore>(
            &db,
            &client,
            None,
            "empty",
            &LimitsConfig::default(),
        )
        .await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
