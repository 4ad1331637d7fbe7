//! Per-topic AI guidance and study-notes generation.
//!
//! Each artifact resolves through three tiers: the value stored on the
//! topic row, the global cross-material cache keyed by normalized
//! (position, topic, path), and finally a fresh completion call whose
//! result is written back to both tiers. `force` bypasses both caches and
//! overwrites them.

use crate::cache::{self, CacheKey};
use crate::db::{Database, StudyMaterial, Topic};
use crate::error::{Error, Result};
use crate::llm::{Completion, CompletionRequest};

/// Which tier satisfied a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    Local,
    Global,
    Generated,
}

impl std::fmt::Display for CacheTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheTier::Local => write!(f, "cached (topic)"),
            CacheTier::Global => write!(f, "cached (shared)"),
            CacheTier::Generated => write!(f, "generated"),
        }
    }
}

/// Resolved artifact text plus the tier that produced it.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub text: String,
    pub tier: CacheTier,
}

fn load_topic_context(db: &Database, topic_id: i64) -> Result<(Topic, StudyMaterial)> {
    let topic = db.get_topic(topic_id)?.ok_or_else(|| Error::not_found("topic"))?;
    let material = db
        .get_material(topic.study_material_id)?
        .ok_or_else(|| Error::not_found("study material"))?;
    Ok((topic, material))
}

/// Get or generate study guidance for a topic.
pub async fn get_or_generate_guidance<C: Completion>(
    db: &Database,
    client: &C,
    topic_id: i64,
    force: bool,
    extra_context: Option<&str>,
) -> Result<GenerationOutcome> {
    let (topic, material) = load_topic_context(db, topic_id)?;
    let key = CacheKey::new(&material.position, &topic.name, topic.category_path.as_deref());

    if !force {
        if let Some(text) = topic.ai_guidance.as_deref().filter(|t| !t.trim().is_empty()) {
            return Ok(GenerationOutcome {
                text: text.to_string(),
                tier: CacheTier::Local,
            });
        }
        if let Some(text) = cache::get_guidance(db, &key).into_option() {
            db.set_topic_guidance(topic_id, &text)?;
            return Ok(GenerationOutcome {
                text,
                tier: CacheTier::Global,
            });
        }
    }

    if !client.is_configured() {
        return Err(Error::config(
            "no completion API key configured and no cached guidance available; \
             set GROQ_API_KEY or GEMINI_API_KEY",
        ));
    }

    let req = guidance_request(&material, &topic, extra_context);
    let completed = client.complete(&req).await?;

    db.set_topic_guidance(topic_id, &completed.text)?;
    cache::put_guidance(db, &key, &completed.text, &completed.provider, &completed.model);

    Ok(GenerationOutcome {
        text: completed.text,
        tier: CacheTier::Generated,
    })
}

/// Get or generate compiled study notes for a topic. The prompt folds in
/// previously generated guidance when present.
pub async fn get_or_generate_notes<C: Completion>(
    db: &Database,
    client: &C,
    topic_id: i64,
    force: bool,
    extra_context: Option<&str>,
) -> Result<GenerationOutcome> {
    let (topic, material) = load_topic_context(db, topic_id)?;
    let key = CacheKey::new(&material.position, &topic.name, topic.category_path.as_deref());

    if !force {
        if let Some(text) = topic.ai_notes.as_deref().filter(|t| !t.trim().is_empty()) {
            return Ok(GenerationOutcome {
                text: text.to_string(),
                tier: CacheTier::Local,
            });
        }
        if let Some(text) = cache::get_notes(db, &key).into_option() {
            db.set_topic_notes(topic_id, &text)?;
            return Ok(GenerationOutcome {
                text,
                tier: CacheTier::Global,
            });
        }
    }

    if !client.is_configured() {
        return Err(Error::config(
            "no completion API key configured and no cached notes available; \
             set GROQ_API_KEY or GEMINI_API_KEY",
        ));
    }

    let req = notes_request(&material, &topic, extra_context);
    let completed = client.complete(&req).await?;

    db.set_topic_notes(topic_id, &completed.text)?;
    cache::put_notes(db, &key, &completed.text, &completed.provider, &completed.model);

    Ok(GenerationOutcome {
        text: completed.text,
        tier: CacheTier::Generated,
    })
}

fn topic_label(topic: &Topic) -> String {
    match topic.category_path.as_deref() {
        Some(path) if !path.is_empty() => format!("{} ({})", topic.name, path),
        _ => topic.name.clone(),
    }
}

fn guidance_request(
    material: &StudyMaterial,
    topic: &Topic,
    extra_context: Option<&str>,
) -> CompletionRequest {
    let mut prompt = format!(
        "For a {} position, what are the specific technical skills and concepts someone \
         needs to know about {}?\n\n\
         Break it down into granular, learnable subtopics. For each, give the skill name, \
         what to know for interviews, and the practical interview focus. Format as clear \
         bullet points.",
        material.position,
        topic_label(topic),
    );
    if let Some(extra) = extra_context.filter(|e| !e.trim().is_empty()) {
        prompt.push_str(&format!("\n\nAdditional context from the candidate:\n{extra}"));
    }

    CompletionRequest::new(
        "You are a helpful interview preparation coach. Provide structured, practical \
         guidance focused on what is actually tested in interviews. Be specific and actionable.",
        prompt,
    )
    .with_budget(400, 0.7)
}

fn notes_request(
    material: &StudyMaterial,
    topic: &Topic,
    extra_context: Option<&str>,
) -> CompletionRequest {
    let mut prompt = format!(
        "Write compact study notes in markdown for the topic {} for a {} interview. \
         Sections: ## Summary (5-8 bullets), ## Flashcards (Q/A pairs), ## Pitfalls, \
         ## Practice tasks.",
        topic_label(topic),
        material.position,
    );
    if let Some(guidance) = topic.ai_guidance.as_deref().filter(|g| !g.trim().is_empty()) {
        prompt.push_str(&format!(
            "\n\nBase the notes on this previously prepared guidance:\n{guidance}"
        ));
    }
    if let Some(extra) = extra_context.filter(|e| !e.trim().is_empty()) {
        prompt.push_str(&format!("\n\nAdditional context from the candidate:\n{extra}"));
    }

    CompletionRequest::new(
        "You are a helpful interview preparation coach. Produce tight, well-structured \
         markdown study notes.",
        prompt,
    )
    .with_budget(600, 0.6)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::error::{Error, Result};
    use crate::llm::{Completed, Completion, CompletionRequest};

    /// Call-counting completion stub.
    pub struct MockCompletion {
        pub reply: String,
        pub configured: bool,
        pub calls: AtomicUsize,
    }

    impl MockCompletion {
        pub fn replying(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                configured: true,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn unconfigured() -> Self {
            Self {
                reply: String::new(),
                configured: false,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Completion for MockCompletion {
        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn complete(&self, _req: &CompletionRequest) -> Result<Completed> {
            if !self.configured {
                return Err(Error::config("no completion API key configured"));
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Completed {
                text: self.reply.clone(),
                provider: "mock".to_string(),
                model: "mock-1".to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::MockCompletion;
    use super::*;
    use crate::db::{Priority, TopicSeed};

    fn setup(position: &str, topic: &str, path: Option<&str>) -> (Database, i64) {
        let db = Database::open_memory().unwrap();
        let material_id = db.create_material("Acme", position, None).unwrap();
        let topic_id = db
            .insert_topic(
                material_id,
                &TopicSeed {
                    name: topic.to_string(),
                    category: path.map(String::from),
                    priority: Priority::Medium,
                },
                "",
            )
            .unwrap();
        (db, topic_id)
    }

    #[tokio::test]
    async fn test_second_request_hits_cache_without_api_call() {
        let (db, topic_id) = setup("Data Scientist", "SQL Joins", Some("SQL"));
        let client = MockCompletion::replying("guidance text");

        let first = get_or_generate_guidance(&db, &client, topic_id, false, None)
            .await
            .unwrap();
        assert_eq!(first.tier, CacheTier::Generated);

        let second = get_or_generate_guidance(&db, &client, topic_id, false, None)
            .await
            .unwrap();
        assert_eq!(second.tier, CacheTier::Local);
        assert_eq!(second.text, first.text);
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_global_cache_shared_across_materials_with_normalization() {
        let (db, topic_a) = setup("Data Scientist", "Machine Learning", None);
        let client = MockCompletion::replying("shared guidance");
        get_or_generate_guidance(&db, &client, topic_a, false, None)
            .await
            .unwrap();

        // A different material, cosmetically different position/topic text.
        let material_b = db.create_material("Other Co", "  data   SCIENTIST ", None).unwrap();
        let topic_b = db
            .insert_topic(
                material_b,
                &TopicSeed {
                    name: " machine    learning ".to_string(),
                    category: None,
                    priority: Priority::Medium,
                },
                "",
            )
            .unwrap();

        let outcome = get_or_generate_guidance(&db, &client, topic_b, false, None)
            .await
            .unwrap();
        assert_eq!(outcome.tier, CacheTier::Global);
        assert_eq!(outcome.text, "shared guidance");
        assert_eq!(client.call_count(), 1);

        // Copied into the local tier on the way through.
        let topic = db.get_topic(topic_b).unwrap().unwrap();
        assert_eq!(topic.ai_guidance.as_deref(), Some("shared guidance"));
    }

    #[tokio::test]
    async fn test_force_regenerates_and_overwrites() {
        let (db, topic_id) = setup("DS", "CTEs", Some("SQL"));
        let client = MockCompletion::replying("v1");
        get_or_generate_guidance(&db, &client, topic_id, false, None)
            .await
            .unwrap();

        let client2 = MockCompletion::replying("v2");
        let outcome = get_or_generate_guidance(&db, &client2, topic_id, true, None)
            .await
            .unwrap();
        assert_eq!(outcome.tier, CacheTier::Generated);
        assert_eq!(outcome.text, "v2");
        assert_eq!(client2.call_count(), 1);

        // Both tiers hold the new value.
        let topic = db.get_topic(topic_id).unwrap().unwrap();
        assert_eq!(topic.ai_guidance.as_deref(), Some("v2"));
        let key = CacheKey::new("DS", "CTEs", Some("SQL"));
        assert_eq!(
            cache::get_guidance(&db, &key).into_option().as_deref(),
            Some("v2")
        );
    }

    #[tokio::test]
    async fn test_unconfigured_with_no_cache_is_config_error() {
        let (db, topic_id) = setup("DS", "Joins", None);
        let client = MockCompletion::unconfigured();
        let result = get_or_generate_guidance(&db, &client, topic_id, false, None).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_unconfigured_still_serves_cached_value() {
        let (db, topic_id) = setup("DS", "Joins", None);
        db.set_topic_guidance(topic_id, "stored earlier").unwrap();

        let client = MockCompletion::unconfigured();
        let outcome = get_or_generate_guidance(&db, &client, topic_id, false, None)
            .await
            .unwrap();
        assert_eq!(outcome.tier, CacheTier::Local);
        assert_eq!(outcome.text, "stored earlier");
    }

    #[tokio::test]
    async fn test_notes_and_guidance_are_independent() {
        let (db, topic_id) = setup("DS", "Joins", None);
        let client = MockCompletion::replying("artifact");

        get_or_generate_guidance(&db, &client, topic_id, false, None)
            .await
            .unwrap();
        let notes = get_or_generate_notes(&db, &client, topic_id, false, None)
            .await
            .unwrap();
        assert_eq!(notes.tier, CacheTier::Generated);
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_topic_is_not_found() {
        let db = Database::open_memory().unwrap();
        let client = MockCompletion::replying("x");
        let result = get_or_generate_guidance(&db, &client, 404, false, None).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
