//! Best-effort upsert caches keyed by normalized text.
//!
//! Four caches share one pattern: composite-key upsert, no TTL, no
//! eviction. Reads return a tri-state lookup; a missing backing table is
//! `Unavailable`, which callers treat exactly like `Miss`. Storage errors
//! never propagate out of this module — the caches are an optimization,
//! not a source of truth.

use crate::db::Database;
use crate::error::is_missing_table;

/// Cache lookup outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup<T> {
    Hit(T),
    Miss,
    /// Backing table absent or unreadable; logged, treated as a miss.
    Unavailable,
}

impl<T> CacheLookup<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            CacheLookup::Hit(v) => Some(v),
            CacheLookup::Miss | CacheLookup::Unavailable => None,
        }
    }
}

/// Normalize a string for use as a cache key: trim, lowercase, collapse
/// internal whitespace. "Machine Learning" and "  machine   learning "
/// collide deliberately.
pub fn normalize_key(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Composite key for the cross-material guidance/notes caches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    pub position: String,
    pub topic: String,
    pub topic_path: String,
}

impl CacheKey {
    pub fn new(position: &str, topic: &str, topic_path: Option<&str>) -> Self {
        Self {
            position: normalize_key(position),
            topic: normalize_key(topic),
            topic_path: normalize_key(topic_path.unwrap_or("")),
        }
    }
}

fn lookup_text(db: &Database, sql: &str, key: &CacheKey) -> CacheLookup<String> {
    use rusqlite::OptionalExtension;
    let result = db
        .conn()
        .query_row(
            sql,
            rusqlite::params![key.position, key.topic, key.topic_path],
            |row| row.get::<_, String>(0),
        )
        .optional();
    match result {
        Ok(Some(text)) => CacheLookup::Hit(text),
        Ok(None) => CacheLookup::Miss,
        Err(e) if is_missing_table(&e) => {
            tracing::debug!("cache table missing, treating as miss: {e}");
            CacheLookup::Unavailable
        }
        Err(e) => {
            tracing::warn!("cache read failed, treating as miss: {e}");
            CacheLookup::Unavailable
        }
    }
}

fn upsert_text(
    db: &Database,
    sql: &str,
    key: &CacheKey,
    text: &str,
    provider: &str,
    model: &str,
) {
    // Never cache an empty result.
    if text.trim().is_empty() {
        return;
    }
    let now = chrono::Utc::now().to_rfc3339();
    let result = db.conn().execute(
        sql,
        rusqlite::params![key.position, key.topic, key.topic_path, text, provider, model, now],
    );
    if let Err(e) = result {
        if is_missing_table(&e) {
            tracing::debug!("cache table missing, skipping write: {e}");
        } else {
            tracing::warn!("cache write failed: {e}");
        }
    }
}

// ========== Guidance cache ==========

pub fn get_guidance(db: &Database, key: &CacheKey) -> CacheLookup<String> {
    lookup_text(
        db,
        "SELECT guidance_text FROM guidance_cache
         WHERE position_key = ?1 AND topic_key = ?2 AND topic_path_key = ?3",
        key,
    )
}

pub fn put_guidance(db: &Database, key: &CacheKey, text: &str, provider: &str, model: &str) {
    upsert_text(
        db,
        r#"
        INSERT INTO guidance_cache
            (position_key, topic_key, topic_path_key, guidance_text, provider, model, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(position_key, topic_key, topic_path_key) DO UPDATE SET
            guidance_text = excluded.guidance_text,
            provider = excluded.provider,
            model = excluded.model,
            updated_at = excluded.updated_at
        "#,
        key,
        text,
        provider,
        model,
    );
}

// ========== Notes cache ==========

pub fn get_notes(db: &Database, key: &CacheKey) -> CacheLookup<String> {
    lookup_text(
        db,
        "SELECT notes_text FROM notes_cache
         WHERE position_key = ?1 AND topic_key = ?2 AND topic_path_key = ?3",
        key,
    )
}

pub fn put_notes(db: &Database, key: &CacheKey, text: &str, provider: &str, model: &str) {
    upsert_text(
        db,
        r#"
        INSERT INTO notes_cache
            (position_key, topic_key, topic_path_key, notes_text, provider, model, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(position_key, topic_key, topic_path_key) DO UPDATE SET
            notes_text = excluded.notes_text,
            provider = excluded.provider,
            model = excluded.model,
            updated_at = excluded.updated_at
        "#,
        key,
        text,
        provider,
        model,
    );
}

// ========== Topic summary cache ==========

/// Keyed by topic text alone, ignoring position and module, so guide
/// compilations across folders reuse each other's summaries.
pub fn get_topic_summary(db: &Database, topic: &str) -> CacheLookup<String> {
    use rusqlite::OptionalExtension;
    let key = normalize_key(topic);
    let result = db
        .conn()
        .query_row(
            "SELECT summary_markdown FROM topic_summary_cache WHERE topic_key = ?1",
            [&key],
            |row| row.get::<_, String>(0),
        )
        .optional();
    match result {
        Ok(Some(text)) => CacheLookup::Hit(text),
        Ok(None) => CacheLookup::Miss,
        Err(e) if is_missing_table(&e) => {
            tracing::debug!("cache table missing, treating as miss: {e}");
            CacheLookup::Unavailable
        }
        Err(e) => {
            tracing::warn!("cache read failed, treating as miss: {e}");
            CacheLookup::Unavailable
        }
    }
}

pub fn put_topic_summary(db: &Database, topic: &str, summary: &str) {
    if summary.trim().is_empty() {
        return;
    }
    let key = normalize_key(topic);
    let now = chrono::Utc::now().to_rfc3339();
    let result = db.conn().execute(
        r#"
        INSERT INTO topic_summary_cache (topic_key, summary_markdown, updated_at)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(topic_key) DO UPDATE SET
            summary_markdown = excluded.summary_markdown,
            updated_at = excluded.updated_at
        "#,
        rusqlite::params![key, summary, now],
    );
    if let Err(e) = result {
        tracing::warn!("cache write failed: {e}");
    }
}
