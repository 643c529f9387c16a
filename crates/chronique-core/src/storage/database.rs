use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use uuid::Uuid;

use crate::error::{ChroniqueError, Result};
use crate::models::{
    CanonicalAuthor, CanonicalBook, CanonicalCritic, MatchPhase, MergeAuditRecord,
    ResolutionEntry, ResolutionKey, ResolutionStatus, ResolutionUpdate,
};

/// SQLite-backed canonical store. Each statement is atomic at
/// single-row granularity; no multi-document transactions are assumed
/// by callers.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Create all tables if they don't exist.
    pub(crate) fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS books (
                id           TEXT PRIMARY KEY,
                title        TEXT NOT NULL,
                author_id    TEXT NOT NULL,
                publisher    TEXT,
                identity_key TEXT,
                episode_refs TEXT NOT NULL DEFAULT '[]',
                review_refs  TEXT NOT NULL DEFAULT '[]',
                created_at   TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS authors (
                id       TEXT PRIMARY KEY,
                name     TEXT NOT NULL,
                book_ids TEXT NOT NULL DEFAULT '[]'
            );

            CREATE TABLE IF NOT EXISTS critics (
                id       TEXT PRIMARY KEY,
                name     TEXT NOT NULL,
                variants TEXT NOT NULL DEFAULT '[]'
            );

            -- One row per distinct mention key. The UNIQUE constraint
            -- is the storage-level backstop that makes concurrent
            -- upserts on the same key collapse into one row.
            CREATE TABLE IF NOT EXISTS resolution_cache (
                id                 TEXT PRIMARY KEY,
                source_reference   TEXT NOT NULL,
                author_norm        TEXT NOT NULL,
                title_norm         TEXT NOT NULL,
                status             TEXT NOT NULL DEFAULT 'unresolved',
                resolved_book_id   TEXT,
                resolved_critic_id TEXT,
                match_phase        TEXT,
                created_at         TEXT NOT NULL,
                updated_at         TEXT NOT NULL,
                UNIQUE (source_reference, author_norm, title_norm)
            );

            CREATE TABLE IF NOT EXISTS merge_audit (
                id                   TEXT PRIMARY KEY,
                identity_key         TEXT NOT NULL,
                primary_id           TEXT NOT NULL,
                deleted_ids          TEXT NOT NULL,
                merged_episode_count INTEGER NOT NULL,
                merged_review_count  INTEGER NOT NULL,
                canonical_title      TEXT NOT NULL,
                canonical_publisher  TEXT,
                created_at           TEXT NOT NULL
            );
            ",
        )?;

        self.conn.execute_batch(
            "
            CREATE INDEX IF NOT EXISTS idx_books_identity_key ON books(identity_key);
            CREATE INDEX IF NOT EXISTS idx_books_author_id    ON books(author_id);
            CREATE INDEX IF NOT EXISTS idx_resolution_status  ON resolution_cache(status);
            ",
        )?;

        Ok(())
    }

    // ─── Book CRUD ──────────────────────────────────────────

    /// Insert or replace a book.
    pub fn upsert_book(&self, book: &CanonicalBook) -> Result<()> {
        let episode_refs = serde_json::to_string(&book.episode_refs)?;
        let review_refs = serde_json::to_string(&book.review_refs)?;

        self.conn.execute(
            "INSERT OR REPLACE INTO books
                (id, title, author_id, publisher, identity_key,
                 episode_refs, review_refs, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                book.id.to_string(),
                book.title,
                book.author_id.to_string(),
                book.publisher.as_deref(),
                book.identity_key.as_deref(),
                episode_refs,
                review_refs,
                book.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_book(&self, id: &Uuid) -> Result<CanonicalBook> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, author_id, publisher, identity_key,
                    episode_refs, review_refs, created_at
             FROM books WHERE id = ?1",
        )?;

        stmt.query_row(params![id.to_string()], Self::row_to_book)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    ChroniqueError::BookNotFound(id.to_string())
                }
                other => ChroniqueError::Database(other),
            })
    }

    /// Load several books, failing on the first missing id.
    pub fn get_books(&self, ids: &[Uuid]) -> Result<Vec<CanonicalBook>> {
        ids.iter().map(|id| self.get_book(id)).collect()
    }

    /// List all books in stable (created_at, id) order.
    pub fn list_books(&self) -> Result<Vec<CanonicalBook>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, author_id, publisher, identity_key,
                    episode_refs, review_refs, created_at
             FROM books ORDER BY created_at, id",
        )?;

        let rows = stmt
            .query_map([], Self::row_to_book)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Update an existing book in a single statement. Metadata and
    /// reference sets land together or not at all.
    pub fn update_book(&self, book: &CanonicalBook) -> Result<()> {
        let episode_refs = serde_json::to_string(&book.episode_refs)?;
        let review_refs = serde_json::to_string(&book.review_refs)?;

        let updated = self.conn.execute(
            "UPDATE books
             SET title = ?1, author_id = ?2, publisher = ?3, identity_key = ?4,
                 episode_refs = ?5, review_refs = ?6
             WHERE id = ?7",
            params![
                book.title,
                book.author_id.to_string(),
                book.publisher.as_deref(),
                book.identity_key.as_deref(),
                episode_refs,
                review_refs,
                book.id.to_string(),
            ],
        )?;
        if updated == 0 {
            return Err(ChroniqueError::BookNotFound(book.id.to_string()));
        }
        Ok(())
    }

    /// Delete several books in one statement.
    pub fn delete_books(&self, ids: &[Uuid]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let placeholders = (1..=ids.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("DELETE FROM books WHERE id IN ({placeholders})");
        let id_strings: Vec<String> = ids.iter().map(Uuid::to_string).collect();
        let deleted = self
            .conn
            .execute(&sql, rusqlite::params_from_iter(id_strings.iter()))?;
        Ok(deleted)
    }

    pub fn count_books(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM books", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Group books by identity key, keeping only keys shared by more
    /// than one book. Ordered by descending member count so callers
    /// process the most impactful groups first.
    pub fn books_by_identity_key(&self) -> Result<Vec<(String, Vec<Uuid>)>> {
        let mut stmt = self.conn.prepare(
            "SELECT identity_key, COUNT(*) AS members, GROUP_CONCAT(id)
             FROM books
             WHERE identity_key IS NOT NULL AND identity_key != ''
             GROUP BY identity_key
             HAVING members > 1
             ORDER BY members DESC, identity_key",
        )?;

        let rows = stmt
            .query_map([], |row| {
                let key: String = row.get(0)?;
                let joined: String = row.get(2)?;
                Ok((key, joined))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .map(|(key, joined)| {
                let mut ids: Vec<Uuid> = joined
                    .split(',')
                    .filter_map(|raw| Uuid::parse_str(raw).ok())
                    .collect();
                ids.sort();
                (key, ids)
            })
            .collect())
    }

    // ─── Authors ────────────────────────────────────────────

    pub fn upsert_author(&self, author: &CanonicalAuthor) -> Result<()> {
        let book_ids = serde_json::to_string(&author.book_ids)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO authors (id, name, book_ids) VALUES (?1, ?2, ?3)",
            params![author.id.to_string(), author.name, book_ids],
        )?;
        Ok(())
    }

    pub fn get_author(&self, id: &Uuid) -> Result<CanonicalAuthor> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, book_ids FROM authors WHERE id = ?1")?;

        stmt.query_row(params![id.to_string()], |row| {
            let book_ids_raw: String = row.get(2)?;
            Ok(CanonicalAuthor {
                id: Uuid::parse_str(&row.get::<_, String>(0)?).unwrap_or_default(),
                name: row.get(1)?,
                book_ids: serde_json::from_str(&book_ids_raw).unwrap_or_default(),
            })
        })
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => ChroniqueError::AuthorNotFound(id.to_string()),
            other => ChroniqueError::Database(other),
        })
    }

    /// Pull deleted book ids out of an author's back-reference list.
    pub fn remove_author_book_refs(&self, author_id: &Uuid, book_ids: &[Uuid]) -> Result<()> {
        let mut author = self.get_author(author_id)?;
        for id in book_ids {
            author.book_ids.remove(id);
        }
        let json = serde_json::to_string(&author.book_ids)?;
        self.conn.execute(
            "UPDATE authors SET book_ids = ?1 WHERE id = ?2",
            params![json, author_id.to_string()],
        )?;
        Ok(())
    }

    // ─── Critics ────────────────────────────────────────────

    pub fn upsert_critic(&self, critic: &CanonicalCritic) -> Result<()> {
        let variants = serde_json::to_string(&critic.variants)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO critics (id, name, variants) VALUES (?1, ?2, ?3)",
            params![critic.id.to_string(), critic.name, variants],
        )?;
        Ok(())
    }

    pub fn list_critics(&self) -> Result<Vec<CanonicalCritic>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, variants FROM critics ORDER BY name")?;

        let rows = stmt
            .query_map([], |row| {
                let variants_raw: String = row.get(2)?;
                Ok(CanonicalCritic {
                    id: Uuid::parse_str(&row.get::<_, String>(0)?).unwrap_or_default(),
                    name: row.get(1)?,
                    variants: serde_json::from_str(&variants_raw).unwrap_or_default(),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ─── Resolution cache ───────────────────────────────────

    /// Idempotent upsert keyed on (source_reference, author_norm,
    /// title_norm). A single conditional statement: on conflict it
    /// merges new information into the existing row without touching
    /// `created_at`, without clearing already-resolved ids, and
    /// without regressing a terminal status or demoting a `verified`
    /// entry back to `suggested`. Concurrent calls with the same key
    /// can therefore never create two rows.
    pub fn upsert_resolution(
        &self,
        key: &ResolutionKey,
        update: &ResolutionUpdate,
    ) -> Result<Uuid> {
        let now = Utc::now().to_rfc3339();
        let status = update.status.unwrap_or(ResolutionStatus::Unresolved);

        self.conn.execute(
            "INSERT INTO resolution_cache
                (id, source_reference, author_norm, title_norm, status,
                 resolved_book_id, resolved_critic_id, match_phase,
                 created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
             ON CONFLICT (source_reference, author_norm, title_norm) DO UPDATE SET
                 status = CASE
                     WHEN resolution_cache.status IN ('linked', 'not_found')
                         THEN resolution_cache.status
                     WHEN resolution_cache.status = 'verified'
                          AND excluded.status = 'suggested'
                         THEN resolution_cache.status
                     WHEN excluded.status = 'unresolved'
                         THEN resolution_cache.status
                     ELSE excluded.status
                 END,
                 resolved_book_id =
                     COALESCE(resolution_cache.resolved_book_id, excluded.resolved_book_id),
                 resolved_critic_id =
                     COALESCE(resolution_cache.resolved_critic_id, excluded.resolved_critic_id),
                 match_phase =
                     COALESCE(resolution_cache.match_phase, excluded.match_phase),
                 updated_at = excluded.updated_at",
            params![
                Uuid::now_v7().to_string(),
                key.source_reference,
                key.author_norm,
                key.title_norm,
                status.as_str(),
                update.resolved_book_id.map(|id| id.to_string()),
                update.resolved_critic_id.map(|id| id.to_string()),
                update.match_phase.map(MatchPhase::as_str),
                now,
            ],
        )?;

        let entry = self
            .get_resolution(key)?
            .ok_or_else(|| ChroniqueError::ResolutionNotFound(key.source_reference.clone()))?;
        Ok(entry.id)
    }

    pub fn get_resolution(&self, key: &ResolutionKey) -> Result<Option<ResolutionEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, source_reference, author_norm, title_norm, status,
                    resolved_book_id, resolved_critic_id, match_phase,
                    created_at, updated_at
             FROM resolution_cache
             WHERE source_reference = ?1 AND author_norm = ?2 AND title_norm = ?3",
        )?;

        match stmt.query_row(
            params![key.source_reference, key.author_norm, key.title_norm],
            Self::row_to_resolution,
        ) {
            Ok(entry) => Ok(Some(entry)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(ChroniqueError::Database(e)),
        }
    }

    pub fn get_resolution_by_id(&self, id: &Uuid) -> Result<ResolutionEntry> {
        let mut stmt = self.conn.prepare(
            "SELECT id, source_reference, author_norm, title_norm, status,
                    resolved_book_id, resolved_critic_id, match_phase,
                    created_at, updated_at
             FROM resolution_cache WHERE id = ?1",
        )?;

        stmt.query_row(params![id.to_string()], Self::row_to_resolution)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    ChroniqueError::ResolutionNotFound(id.to_string())
                }
                other => ChroniqueError::Database(other),
            })
    }

    /// Explicit lifecycle advance. Reaching an already-held terminal
    /// state again is a no-op; any other backward move is rejected.
    pub fn advance_resolution(
        &self,
        id: &Uuid,
        new_status: ResolutionStatus,
        resolved_book_id: Option<Uuid>,
        resolved_critic_id: Option<Uuid>,
    ) -> Result<ResolutionEntry> {
        let entry = self.get_resolution_by_id(id)?;

        if entry.status == new_status && new_status.is_terminal() {
            return Ok(entry);
        }
        if !entry.status.can_advance_to(new_status) {
            return Err(ChroniqueError::ValidationError(format!(
                "cannot advance resolution {id} from {} to {new_status}",
                entry.status
            )));
        }

        // Optimistic guard on the previous status so a concurrent
        // advance cannot be silently overwritten.
        let updated = self.conn.execute(
            "UPDATE resolution_cache
             SET status = ?1,
                 resolved_book_id = COALESCE(?2, resolved_book_id),
                 resolved_critic_id = COALESCE(?3, resolved_critic_id),
                 updated_at = ?4
             WHERE id = ?5 AND status = ?6",
            params![
                new_status.as_str(),
                resolved_book_id.map(|v| v.to_string()),
                resolved_critic_id.map(|v| v.to_string()),
                Utc::now().to_rfc3339(),
                id.to_string(),
                entry.status.as_str(),
            ],
        )?;
        if updated == 0 {
            return Err(ChroniqueError::ValidationError(format!(
                "resolution {id} changed concurrently during advance"
            )));
        }

        self.get_resolution_by_id(id)
    }

    /// Operator-facing read path: unresolved / not_found entries stay
    /// visible here instead of being silently dropped.
    pub fn list_resolutions_by_status(
        &self,
        status: ResolutionStatus,
    ) -> Result<Vec<ResolutionEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, source_reference, author_norm, title_norm, status,
                    resolved_book_id, resolved_critic_id, match_phase,
                    created_at, updated_at
             FROM resolution_cache WHERE status = ?1 ORDER BY created_at, id",
        )?;

        let rows = stmt
            .query_map(params![status.as_str()], Self::row_to_resolution)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ─── Merge audit ────────────────────────────────────────

    pub fn append_merge_audit(&self, record: &MergeAuditRecord) -> Result<()> {
        let deleted_ids = serde_json::to_string(&record.deleted_ids)?;
        self.conn.execute(
            "INSERT INTO merge_audit
                (id, identity_key, primary_id, deleted_ids,
                 merged_episode_count, merged_review_count,
                 canonical_title, canonical_publisher, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.id.to_string(),
                record.identity_key,
                record.primary_id.to_string(),
                deleted_ids,
                record.merged_episode_count as i64,
                record.merged_review_count as i64,
                record.canonical_title,
                record.canonical_publisher.as_deref(),
                record.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn list_merge_audit(&self) -> Result<Vec<MergeAuditRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, identity_key, primary_id, deleted_ids,
                    merged_episode_count, merged_review_count,
                    canonical_title, canonical_publisher, created_at
             FROM merge_audit ORDER BY created_at, id",
        )?;

        let rows = stmt
            .query_map([], |row| {
                let deleted_raw: String = row.get(3)?;
                let created_raw: String = row.get(8)?;
                Ok(MergeAuditRecord {
                    id: Uuid::parse_str(&row.get::<_, String>(0)?).unwrap_or_default(),
                    identity_key: row.get(1)?,
                    primary_id: Uuid::parse_str(&row.get::<_, String>(2)?).unwrap_or_default(),
                    deleted_ids: serde_json::from_str(&deleted_raw).unwrap_or_default(),
                    merged_episode_count: row.get::<_, i64>(4)? as usize,
                    merged_review_count: row.get::<_, i64>(5)? as usize,
                    canonical_title: row.get(6)?,
                    canonical_publisher: row.get(7)?,
                    created_at: created_raw.parse().unwrap_or_default(),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ─── Row mapping ────────────────────────────────────────

    fn row_to_book(row: &rusqlite::Row) -> rusqlite::Result<CanonicalBook> {
        let episode_raw: String = row.get(5)?;
        let review_raw: String = row.get(6)?;
        let created_raw: String = row.get(7)?;

        Ok(CanonicalBook {
            id: Uuid::parse_str(&row.get::<_, String>(0)?).unwrap_or_default(),
            title: row.get(1)?,
            author_id: Uuid::parse_str(&row.get::<_, String>(2)?).unwrap_or_default(),
            publisher: row.get(3)?,
            identity_key: row.get(4)?,
            episode_refs: serde_json::from_str::<BTreeSet<Uuid>>(&episode_raw)
                .unwrap_or_default(),
            review_refs: serde_json::from_str::<BTreeSet<Uuid>>(&review_raw).unwrap_or_default(),
            created_at: created_raw.parse::<DateTime<Utc>>().unwrap_or_default(),
        })
    }

    fn row_to_resolution(row: &rusqlite::Row) -> rusqlite::Result<ResolutionEntry> {
        let status_raw: String = row.get(4)?;
        let book_raw: Option<String> = row.get(5)?;
        let critic_raw: Option<String> = row.get(6)?;
        let phase_raw: Option<String> = row.get(7)?;
        let created_raw: String = row.get(8)?;
        let updated_raw: String = row.get(9)?;

        Ok(ResolutionEntry {
            id: Uuid::parse_str(&row.get::<_, String>(0)?).unwrap_or_default(),
            key: ResolutionKey {
                source_reference: row.get(1)?,
                author_norm: row.get(2)?,
                title_norm: row.get(3)?,
            },
            status: ResolutionStatus::parse(&status_raw).unwrap_or(ResolutionStatus::Unresolved),
            resolved_book_id: book_raw.and_then(|raw| Uuid::parse_str(&raw).ok()),
            resolved_critic_id: critic_raw.and_then(|raw| Uuid::parse_str(&raw).ok()),
            match_phase: phase_raw.as_deref().and_then(MatchPhase::parse),
            created_at: created_raw.parse::<DateTime<Utc>>().unwrap_or_default(),
            updated_at: updated_raw.parse::<DateTime<Utc>>().unwrap_or_default(),
        })
    }
}
