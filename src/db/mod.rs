//! SQLite database operations for cram.

pub mod schema;

pub use schema::{
    init_db, CompiledGuide, FlashcardDeck, GuideKind, IndexedFile, MaterialSummary, Priority,
    StudyMaterial, Topic,
};

use std::path::Path;
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{is_locked, Error, Result};

/// Schema init retries on transient lock conflicts.
const INIT_RETRIES: u32 = 3;
const INIT_BACKOFF_MS: u64 = 100;

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Fields of a topic that can be partially updated. `None` keeps the
/// stored value.
#[derive(Debug, Default, Clone)]
pub struct TopicPatch {
    pub name: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

/// A topic to insert, as produced by the topic generator or user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSeed {
    pub name: String,
    pub category: Option<String>,
    pub priority: Priority,
}

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        init_with_retry(&conn)?;
        Ok(Self { conn })
    }

    /// Open in-memory database for testing.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_db(&conn)?;
        Ok(Self { conn })
    }

    /// Get connection reference.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // ========== Study materials ==========

    /// Create a study material. A blank company falls back to a generic
    /// placeholder; a blank date is stored as NULL.
    pub fn create_material(
        &self,
        company: &str,
        position: &str,
        date: Option<&str>,
    ) -> Result<i64> {
        let company = if company.trim().is_empty() {
            "Generic Company (US)"
        } else {
            company.trim()
        };
        let date = date.map(str::trim).filter(|d| !d.is_empty());
        self.conn.execute(
            r#"
            INSERT INTO study_materials (company, position, date, created_at, status)
            VALUES (?1, ?2, ?3, ?4, 'active')
            "#,
            params![company, position, date, now()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Get a study material by id.
    pub fn get_material(&self, id: i64) -> Result<Option<StudyMaterial>> {
        self.conn
            .query_row(
                "SELECT * FROM study_materials WHERE id = ?1",
                [id],
                StudyMaterial::from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    /// List active materials with topic progress counts, soonest date
    /// first and undated materials last.
    pub fn list_materials(&self) -> Result<Vec<MaterialSummary>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT m.*,
                   COUNT(DISTINCT t.id) AS topic_count,
                   COUNT(DISTINCT CASE WHEN t.status = 'completed' THEN t.id END) AS completed_topics
            FROM study_materials m
            LEFT JOIN topics t ON m.id = t.study_material_id
            WHERE m.status = 'active'
            GROUP BY m.id
            ORDER BY CASE WHEN m.date IS NULL THEN 1 ELSE 0 END, m.date ASC, m.created_at DESC
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(MaterialSummary {
                material: StudyMaterial::from_row(row)?,
                topic_count: row.get("topic_count")?,
                completed_topics: row.get("completed_topics")?,
            })
        })?;

        let mut materials = Vec::new();
        for row in rows {
            materials.push(row?);
        }
        Ok(materials)
    }

    /// Delete a material and everything attached to it in one transaction.
    pub fn delete_material(&self, id: i64) -> Result<()> {
        if self.get_material(id)?.is_none() {
            return Err(Error::not_found("study material"));
        }
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM topics WHERE study_material_id = ?1", [id])?;
        tx.execute("DELETE FROM study_sessions WHERE study_material_id = ?1", [id])?;
        tx.execute("DELETE FROM study_materials WHERE id = ?1", [id])?;
        tx.commit()?;
        Ok(())
    }

    // ========== Topics ==========

    /// Insert a topic for a material.
    pub fn insert_topic(&self, material_id: i64, seed: &TopicSeed, notes: &str) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO topics (study_material_id, name, category_path, priority, notes)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                material_id,
                seed.name,
                seed.category,
                seed.priority.as_str(),
                notes
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Get a topic by id.
    pub fn get_topic(&self, id: i64) -> Result<Option<Topic>> {
        self.conn
            .query_row("SELECT * FROM topics WHERE id = ?1", [id], Topic::from_row)
            .optional()
            .map_err(Error::from)
    }

    /// Topics for a material, grouped by category path, high priority
    /// first within a category, then by name.
    pub fn topics_for_material(&self, material_id: i64) -> Result<Vec<Topic>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT * FROM topics
            WHERE study_material_id = ?1
            ORDER BY COALESCE(category_path, '') ASC,
                     CASE priority WHEN 'high' THEN 0 WHEN 'medium' THEN 1 ELSE 2 END ASC,
                     name ASC
            "#,
        )?;
        let rows = stmt.query_map([material_id], Topic::from_row)?;

        let mut topics = Vec::new();
        for row in rows {
            topics.push(row?);
        }
        Ok(topics)
    }

    /// Partially update a topic, preserving fields the patch leaves unset.
    pub fn update_topic(&self, id: i64, patch: &TopicPatch) -> Result<()> {
        let existing = self.get_topic(id)?.ok_or_else(|| Error::not_found("topic"))?;
        let name = patch.name.as_deref().unwrap_or(&existing.name);
        let priority = patch.priority.unwrap_or(existing.priority);
        let status = patch.status.as_deref().unwrap_or(&existing.status);
        let notes = patch.notes.as_deref().unwrap_or(&existing.notes);
        self.conn.execute(
            r#"
            UPDATE topics SET name = ?1, priority = ?2, status = ?3, notes = ?4
            WHERE id = ?5
            "#,
            params![name, priority.as_str(), status, notes, id],
        )?;
        Ok(())
    }

    /// Delete a topic.
    pub fn delete_topic(&self, id: i64) -> Result<()> {
        self.conn.execute("DELETE FROM topics WHERE id = ?1", [id])?;
        Ok(())
    }

    /// Store generated guidance on the topic row.
    pub fn set_topic_guidance(&self, id: i64, guidance: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE topics SET ai_guidance = ?1 WHERE id = ?2",
            params![guidance, id],
        )?;
        Ok(())
    }

    /// Store compiled notes on the topic row.
    pub fn set_topic_notes(&self, id: i64, notes: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE topics SET ai_notes = ?1 WHERE id = ?2",
            params![notes, id],
        )?;
        Ok(())
    }

    // ========== Settings ==========

    /// Get a setting value.
    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(Error::from)
    }

    /// Upsert a setting.
    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![key, value, now()],
        )?;
        Ok(())
    }

    // ========== Indexed files ==========

    /// Upsert file metadata from a folder listing. Extraction columns are
    /// left untouched so re-indexing never clobbers extracted state.
    pub fn upsert_indexed_file(&self, file: &IndexedFile) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO indexed_files
                (file_id, folder_id, name, mime_type, modified_time, size, path, parent_id, indexed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(file_id) DO UPDATE SET
                folder_id = excluded.folder_id,
                name = excluded.name,
                mime_type = excluded.mime_type,
                modified_time = excluded.modified_time,
                size = excluded.size,
                path = excluded.path,
                parent_id = excluded.parent_id,
                indexed_at = excluded.indexed_at
            "#,
            params![
                file.file_id,
                file.folder_id,
                file.name,
                file.mime_type,
                file.modified_time,
                file.size,
                file.path,
                file.parent_id,
                file.indexed_at,
            ],
        )?;
        Ok(())
    }

    /// Get an indexed file by id.
    pub fn get_indexed_file(&self, file_id: &str) -> Result<Option<IndexedFile>> {
        self.conn
            .query_row(
                "SELECT * FROM indexed_files WHERE file_id = ?1",
                [file_id],
                IndexedFile::from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    /// All indexed files for a folder.
    pub fn files_in_folder(&self, folder_id: &str) -> Result<Vec<IndexedFile>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM indexed_files WHERE folder_id = ?1 ORDER BY path ASC")?;
        let rows = stmt.query_map([folder_id], IndexedFile::from_row)?;

        let mut files = Vec::new();
        for row in rows {
            files.push(row?);
        }
        Ok(files)
    }

    /// Files still needing extraction. With `force` every file in the
    /// folder is returned.
    pub fn pending_files(&self, folder_id: &str, force: bool) -> Result<Vec<IndexedFile>> {
        let sql = if force {
            "SELECT * FROM indexed_files WHERE folder_id = ?1 ORDER BY path ASC"
        } else {
            "SELECT * FROM indexed_files
             WHERE folder_id = ?1 AND (text_excerpt IS NULL OR extracted_topics_json IS NULL)
             ORDER BY path ASC"
        };
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([folder_id], IndexedFile::from_row)?;

        let mut files = Vec::new();
        for row in rows {
            files.push(row?);
        }
        Ok(files)
    }

    /// Store extraction output for a file. Empty results are stored too,
    /// marking the file processed.
    pub fn store_extraction(
        &self,
        file_id: &str,
        excerpt: &str,
        topics_json: &str,
    ) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE indexed_files
            SET text_excerpt = ?1, extracted_topics_json = ?2, extracted_at = ?3
            WHERE file_id = ?4
            "#,
            params![excerpt, topics_json, now(), file_id],
        )?;
        Ok(())
    }

    /// Files with extraction output, most recently processed first.
    pub fn recent_extracted_files(&self, folder_id: &str, limit: usize) -> Result<Vec<IndexedFile>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT * FROM indexed_files
            WHERE folder_id = ?1 AND extracted_at IS NOT NULL
            ORDER BY extracted_at DESC
            LIMIT ?2
            "#,
        )?;
        let rows = stmt.query_map(params![folder_id, limit as i64], IndexedFile::from_row)?;

        let mut files = Vec::new();
        for row in rows {
            files.push(row?);
        }
        Ok(files)
    }

    // ========== Guides and decks ==========

    /// Append a compiled guide.
    pub fn insert_guide(&self, folder_id: &str, kind: GuideKind, content: &str) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO compiled_guides (folder_id, kind, content_markdown, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![folder_id, kind.as_str(), content, now()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Latest guide for a folder and kind, by creation timestamp.
    pub fn latest_guide(&self, folder_id: &str, kind: GuideKind) -> Result<Option<CompiledGuide>> {
        self.conn
            .query_row(
                r#"
                SELECT * FROM compiled_guides
                WHERE folder_id = ?1 AND kind = ?2
                ORDER BY created_at DESC, id DESC
                LIMIT 1
                "#,
                params![folder_id, kind.as_str()],
                CompiledGuide::from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    /// Append a flashcard deck.
    pub fn insert_deck(&self, folder_id: &str, kind: &str, deck_json: &str) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO flashcard_decks (folder_id, kind, deck_json, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![folder_id, kind, deck_json, now()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Latest deck for a folder and kind.
    pub fn latest_deck(&self, folder_id: &str, kind: &str) -> Result<Option<FlashcardDeck>> {
        self.conn
            .query_row(
                r#"
                SELECT * FROM flashcard_decks
                WHERE folder_id = ?1 AND kind = ?2
                ORDER BY created_at DESC, id DESC
                LIMIT 1
                "#,
                params![folder_id, kind],
                FlashcardDeck::from_row,
            )
            .optional()
            .map_err(Error::from)
    }
}

/// Run schema init, retrying transient lock conflicts with linear backoff.
fn init_with_retry(conn: &Connection) -> Result<()> {
    let mut attempt = 0;
    loop {
        match init_db(conn) {
            Ok(()) => return Ok(()),
            Err(Error::Sqlite(e)) if is_locked(&e) && attempt < INIT_RETRIES => {
                attempt += 1;
                tracing::warn!("database locked during init, retry {attempt}/{INIT_RETRIES}");
                std::thread::sleep(Duration::from_millis(INIT_BACKOFF_MS * attempt as u64));
            }
            Err(e) => return Err(e),
        }
    }
}
