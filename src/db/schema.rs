//! Database schema definitions and typed records.
//!
//! Every table is created with `CREATE TABLE IF NOT EXISTS`; columns added
//! across revisions are applied with idempotent `ALTER TABLE ADD COLUMN`
//! calls so older databases upgrade in place. Raw rows never leave this
//! layer: each entity has a struct with `from_row`.

use rusqlite::{Connection, Result, Row};

use crate::error::Error;

/// Initialize database with all tables.
pub fn init_db(conn: &Connection) -> Result<(), Error> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS study_materials (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            company     TEXT NOT NULL,
            position    TEXT NOT NULL,
            date        TEXT,
            created_at  TEXT NOT NULL,
            status      TEXT NOT NULL DEFAULT 'active'
        );

        CREATE TABLE IF NOT EXISTS topics (
            id                 INTEGER PRIMARY KEY AUTOINCREMENT,
            study_material_id  INTEGER NOT NULL,
            name               TEXT NOT NULL,
            category_path      TEXT,
            priority           TEXT NOT NULL DEFAULT 'medium',
            status             TEXT NOT NULL DEFAULT 'pending',
            notes              TEXT NOT NULL DEFAULT '',
            ai_guidance        TEXT,
            ai_notes           TEXT,
            FOREIGN KEY (study_material_id) REFERENCES study_materials(id)
        );

        CREATE INDEX IF NOT EXISTS idx_topics_material ON topics(study_material_id);

        CREATE TABLE IF NOT EXISTS study_sessions (
            id                 INTEGER PRIMARY KEY AUTOINCREMENT,
            study_material_id  INTEGER NOT NULL,
            topic_id           INTEGER NOT NULL,
            date               TEXT,
            duration           INTEGER,
            notes              TEXT,
            FOREIGN KEY (study_material_id) REFERENCES study_materials(id),
            FOREIGN KEY (topic_id) REFERENCES topics(id)
        );

        CREATE TABLE IF NOT EXISTS settings (
            key         TEXT PRIMARY KEY,
            value       TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );
        "#,
    )?;

    // Columns added after the initial release; ignore "duplicate column".
    add_column_if_missing(conn, "topics", "category_path", "TEXT")?;
    add_column_if_missing(conn, "topics", "ai_guidance", "TEXT")?;
    add_column_if_missing(conn, "topics", "ai_notes", "TEXT")?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS guidance_cache (
            position_key    TEXT NOT NULL,
            topic_key       TEXT NOT NULL,
            topic_path_key  TEXT NOT NULL,
            guidance_text   TEXT NOT NULL,
            provider        TEXT NOT NULL,
            model           TEXT NOT NULL,
            updated_at      TEXT NOT NULL,
            UNIQUE (position_key, topic_key, topic_path_key)
        );

        CREATE TABLE IF NOT EXISTS notes_cache (
            position_key    TEXT NOT NULL,
            topic_key       TEXT NOT NULL,
            topic_path_key  TEXT NOT NULL,
            notes_text      TEXT NOT NULL,
            provider        TEXT NOT NULL,
            model           TEXT NOT NULL,
            updated_at      TEXT NOT NULL,
            UNIQUE (position_key, topic_key, topic_path_key)
        );

        CREATE TABLE IF NOT EXISTS topic_summary_cache (
            topic_key         TEXT PRIMARY KEY,
            summary_markdown  TEXT NOT NULL,
            updated_at        TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS indexed_files (
            file_id               TEXT PRIMARY KEY,
            folder_id             TEXT NOT NULL,
            name                  TEXT NOT NULL,
            mime_type             TEXT NOT NULL,
            modified_time         TEXT,
            size                  INTEGER NOT NULL DEFAULT 0,
            path                  TEXT NOT NULL,
            parent_id             TEXT,
            extracted_topics_json TEXT,
            text_excerpt          TEXT,
            extracted_at          TEXT,
            indexed_at            TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_indexed_files_folder ON indexed_files(folder_id);

        CREATE TABLE IF NOT EXISTS compiled_guides (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            folder_id         TEXT NOT NULL,
            kind              TEXT NOT NULL,
            content_markdown  TEXT NOT NULL,
            created_at        TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_guides_folder ON compiled_guides(folder_id, kind);

        CREATE TABLE IF NOT EXISTS flashcard_decks (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            folder_id   TEXT NOT NULL,
            kind        TEXT NOT NULL,
            deck_json   TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_decks_folder ON flashcard_decks(folder_id, kind);
        "#,
    )?;

    Ok(())
}

fn add_column_if_missing(
    conn: &Connection,
    table: &str,
    column: &str,
    ty: &str,
) -> Result<(), Error> {
    let sql = format!("ALTER TABLE {table} ADD COLUMN {column} {ty}");
    match conn.execute(&sql, []) {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(_, Some(msg))) if msg.contains("duplicate column") => {
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Topic priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    /// Parse a stored value; anything unrecognized is medium.
    pub fn parse(s: &str) -> Self {
        match s {
            "high" => Priority::High,
            "low" => Priority::Low,
            _ => Priority::Medium,
        }
    }

    /// Sort rank, high first.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Compiled guide flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuideKind {
    Concise,
    DsMid,
}

impl GuideKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuideKind::Concise => "concise",
            GuideKind::DsMid => "ds_mid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "concise" => Some(GuideKind::Concise),
            "ds_mid" => Some(GuideKind::DsMid),
            _ => None,
        }
    }
}

impl std::fmt::Display for GuideKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Study material record: one job-application context.
#[derive(Debug, Clone)]
pub struct StudyMaterial {
    pub id: i64,
    pub company: String,
    pub position: String,
    pub date: Option<String>,
    pub created_at: String,
    pub status: String,
}

impl StudyMaterial {
    pub fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            company: row.get("company")?,
            position: row.get("position")?,
            date: row.get("date")?,
            created_at: row.get("created_at")?,
            status: row.get("status")?,
        })
    }
}

/// Study material with topic progress counts.
#[derive(Debug, Clone)]
pub struct MaterialSummary {
    pub material: StudyMaterial,
    pub topic_count: i64,
    pub completed_topics: i64,
}

/// Topic record: one learnable unit of preparation.
#[derive(Debug, Clone)]
pub struct Topic {
    pub id: i64,
    pub study_material_id: i64,
    pub name: String,
    /// "A > B" display path; not a referential structure.
    pub category_path: Option<String>,
    pub priority: Priority,
    pub status: String,
    pub notes: String,
    pub ai_guidance: Option<String>,
    pub ai_notes: Option<String>,
}

impl Topic {
    pub fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            study_material_id: row.get("study_material_id")?,
            name: row.get("name")?,
            category_path: row.get("category_path")?,
            priority: Priority::parse(&row.get::<_, String>("priority")?),
            status: row.get("status")?,
            notes: row.get("notes")?,
            ai_guidance: row.get("ai_guidance")?,
            ai_notes: row.get("ai_notes")?,
        })
    }
}

/// Cloud file metadata plus extraction state.
#[derive(Debug, Clone)]
pub struct IndexedFile {
    pub file_id: String,
    pub folder_id: String,
    pub name: String,
    pub mime_type: String,
    pub modified_time: Option<String>,
    pub size: i64,
    pub path: String,
    pub parent_id: Option<String>,
    pub extracted_topics_json: Option<String>,
    pub text_excerpt: Option<String>,
    pub extracted_at: Option<String>,
    pub indexed_at: String,
}

impl IndexedFile {
    pub fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            file_id: row.get("file_id")?,
            folder_id: row.get("folder_id")?,
            name: row.get("name")?,
            mime_type: row.get("mime_type")?,
            modified_time: row.get("modified_time")?,
            size: row.get("size")?,
            path: row.get("path")?,
            parent_id: row.get("parent_id")?,
            extracted_topics_json: row.get("extracted_topics_json")?,
            text_excerpt: row.get("text_excerpt")?,
            extracted_at: row.get("extracted_at")?,
            indexed_at: row.get("indexed_at")?,
        })
    }
}

/// Compiled guide record (append-only, latest wins).
#[derive(Debug, Clone)]
pub struct CompiledGuide {
    pub id: i64,
    pub folder_id: String,
    pub kind: String,
    pub content_markdown: String,
    pub created_at: String,
}

impl CompiledGuide {
    pub fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            folder_id: row.get("folder_id")?,
            kind: row.get("kind")?,
            content_markdown: row.get("content_markdown")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Flashcard deck record (append-only, latest wins).
#[derive(Debug, Clone)]
pub struct FlashcardDeck {
    pub id: i64,
    pub folder_id: String,
    pub kind: String,
    pub deck_json: String,
    pub created_at: String,
}

impl FlashcardDeck {
    pub fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            folder_id: row.get("folder_id")?,
            kind: row.get("kind")?,
            deck_json: row.get("deck_json")?,
            created_at: row.get("created_at")?,
        })
    }
}
