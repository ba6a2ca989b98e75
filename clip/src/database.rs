//! SQLite database layer for clipboard history
//!
//! One logical table, `history`: unique on text, partially unique on tag.
//! Uses r2d2 connection pooling; in-memory databases are pinned to a single
//! connection so every query sees the same state.

use crate::models::Entry;
use crate::repository::Repository;
use chrono::{DateTime, TimeZone, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Constraint violation: {0}")]
    Constraint(String),
    #[error("No history row with id {0}")]
    NotFound(i64),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

const ENTRY_COLUMNS: &str = "id, text, usageCount, locked, tag, masked, recency, timestamp";

/// Parse timestamp string from database to DateTime<Utc>
fn parse_db_timestamp(timestamp_str: &str) -> DateTime<Utc> {
    chrono::NaiveDateTime::parse_from_str(timestamp_str, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(timestamp_str, "%Y-%m-%d %H:%M:%S"))
        .map(|dt| Utc.from_utc_datetime(&dt))
        .unwrap_or_else(|_| Utc::now())
}

fn format_db_timestamp(timestamp_unix: i64) -> String {
    let timestamp = Utc.timestamp_opt(timestamp_unix, 0).single().unwrap_or_else(Utc::now);
    timestamp.format("%Y-%m-%d %H:%M:%S%.f").to_string()
}

/// Constraint failures come back from SQLite as generic errors; surface them
/// as `Constraint` so callers can tell them apart from I/O trouble.
fn classify(err: rusqlite::Error) -> DatabaseError {
    match &err {
        rusqlite::Error::SqliteFailure(code, message)
            if code.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            DatabaseError::Constraint(message.clone().unwrap_or_else(|| err.to_string()))
        }
        _ => DatabaseError::Sqlite(err),
    }
}

/// Thread-safe database wrapper using connection pooling
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Open or create a database at the given path with connection pooling
    pub fn open<P: AsRef<Path>>(path: P) -> DatabaseResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(path.as_ref())
            .with_init(|conn| {
                conn.execute_batch("
                    PRAGMA journal_mode=WAL;
                    PRAGMA synchronous=NORMAL;
                ")?;
                Ok(())
            });

        let pool = Pool::builder()
            .max_size(4)
            .build(manager)?;

        let db = Self { pool };
        db.setup_schema()?;
        info!(path = %path.as_ref().display(), "opened history database");
        Ok(db)
    }

    /// Open an in-memory database (tests, throwaway sessions)
    pub fn open_in_memory() -> DatabaseResult<Self> {
        let manager = SqliteConnectionManager::memory();

        // In-memory needs single connection to maintain state
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)?;

        let db = Self { pool };
        db.setup_schema()?;
        Ok(db)
    }

    /// Get a connection from the pool
    fn get_conn(&self) -> DatabaseResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    fn setup_schema(&self) -> DatabaseResult<()> {
        let conn = self.get_conn()?;

        conn.execute_batch(r#"
            CREATE TABLE IF NOT EXISTS history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                text TEXT NOT NULL UNIQUE,
                usageCount INTEGER NOT NULL DEFAULT 0,
                locked INTEGER NOT NULL DEFAULT 0,
                tag TEXT,
                masked INTEGER NOT NULL DEFAULT 0,
                recency INTEGER NOT NULL DEFAULT 0,
                timestamp TEXT NOT NULL
            );
        "#)?;

        // Databases created before masking existed lack the column
        let has_masked = conn.prepare("SELECT masked FROM history LIMIT 0").is_ok();
        if !has_masked {
            debug!("adding masked column to history table");
            conn.execute_batch("ALTER TABLE history ADD COLUMN masked INTEGER NOT NULL DEFAULT 0")?;
        }

        conn.execute_batch(r#"
            CREATE INDEX IF NOT EXISTS idx_history_recency ON history(recency);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_history_tag ON history(tag) WHERE tag IS NOT NULL;
        "#)?;

        Ok(())
    }

    /// Get the database size in bytes
    pub fn database_size(&self) -> DatabaseResult<i64> {
        let conn = self.get_conn()?;
        let page_count: i64 = conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
        let page_size: i64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;
        Ok(page_count * page_size)
    }

    fn select_one(&self, clause: &str, param: &dyn rusqlite::ToSql) -> DatabaseResult<Option<Entry>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM history {} LIMIT 1", ENTRY_COLUMNS, clause);
        let entry = conn.query_row(&sql, [param], Self::row_to_entry).optional()?;
        Ok(entry)
    }

    fn select_first(&self, clause: &str) -> DatabaseResult<Option<Entry>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM history {} LIMIT 1", ENTRY_COLUMNS, clause);
        let entry = conn.query_row(&sql, [], Self::row_to_entry).optional()?;
        Ok(entry)
    }

    fn update_row(conn: &rusqlite::Connection, entry: &Entry) -> DatabaseResult<()> {
        let id = entry.id.ok_or(DatabaseError::NotFound(0))?;
        let changed = conn
            .execute(
                r#"UPDATE history
                   SET text = ?1, usageCount = ?2, locked = ?3, tag = ?4, masked = ?5, recency = ?6, timestamp = ?7
                   WHERE id = ?8"#,
                params![
                    entry.text,
                    entry.usage_count,
                    entry.locked,
                    entry.tag.map(String::from),
                    entry.masked,
                    entry.recency,
                    format_db_timestamp(entry.timestamp_unix),
                    id,
                ],
            )
            .map_err(classify)?;
        if changed == 0 {
            return Err(DatabaseError::NotFound(id));
        }
        Ok(())
    }

    fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<Entry> {
        let id: i64 = row.get(0)?;
        let text: String = row.get(1)?;
        let usage_count: i64 = row.get(2)?;
        let locked: bool = row.get(3)?;
        let tag: Option<String> = row.get(4)?;
        let masked: bool = row.get(5)?;
        let recency: i64 = row.get(6)?;
        let timestamp_str: String = row.get(7)?;

        Ok(Entry {
            id: Some(id),
            text,
            usage_count: u32::try_from(usage_count).unwrap_or(u32::MAX),
            locked,
            tag: tag.and_then(|t| t.chars().next()),
            masked,
            recency,
            timestamp_unix: parse_db_timestamp(&timestamp_str).timestamp(),
        })
    }
}

impl Repository for Database {
    fn insert(&self, entry: &Entry) -> DatabaseResult<i64> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO history (text, usageCount, locked, tag, masked, recency, timestamp)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            params![
                entry.text,
                entry.usage_count,
                entry.locked,
                entry.tag.map(String::from),
                entry.masked,
                entry.recency,
                format_db_timestamp(entry.timestamp_unix),
            ],
        )
        .map_err(classify)?;
        Ok(conn.last_insert_rowid())
    }

    fn update(&self, entry: &Entry) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        Self::update_row(&conn, entry)
    }

    fn update_displacing(&self, entry: &Entry, displaced: Option<i64>) -> DatabaseResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        if let Some(gone) = displaced {
            let changed = tx.execute("DELETE FROM history WHERE id = ?1", [gone])?;
            if changed == 0 {
                return Err(DatabaseError::NotFound(gone));
            }
        }
        // Dropping `tx` on error rolls the delete back
        Self::update_row(&tx, entry)?;
        tx.commit()?;
        Ok(())
    }

    fn delete(&self, id: i64) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        let changed = conn.execute("DELETE FROM history WHERE id = ?1", [id])?;
        if changed == 0 {
            return Err(DatabaseError::NotFound(id));
        }
        Ok(())
    }

    fn delete_unlocked(&self) -> DatabaseResult<usize> {
        let conn = self.get_conn()?;
        Ok(conn.execute("DELETE FROM history WHERE locked = 0", [])?)
    }

    fn find_by_id(&self, id: i64) -> DatabaseResult<Option<Entry>> {
        self.select_one("WHERE id = ?1", &id)
    }

    fn find_by_text(&self, text: &str) -> DatabaseResult<Option<Entry>> {
        self.select_one("WHERE text = ?1", &text)
    }

    fn find_by_tag(&self, tag: char) -> DatabaseResult<Option<Entry>> {
        self.select_one("WHERE tag = ?1", &String::from(tag))
    }

    fn fetch_ordered(&self, limit: Option<usize>) -> DatabaseResult<Vec<Entry>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM history ORDER BY recency DESC, id DESC LIMIT ?1",
            ENTRY_COLUMNS
        );
        // SQLite treats a negative LIMIT as unbounded
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map([limit], Self::row_to_entry)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn newest_unlocked(&self) -> DatabaseResult<Option<Entry>> {
        self.select_first("WHERE locked = 0 ORDER BY recency DESC, id DESC")
    }

    fn eviction_candidate(&self) -> DatabaseResult<Option<Entry>> {
        self.select_first("WHERE locked = 0 ORDER BY usageCount ASC, recency ASC, id ASC")
    }

    fn count(&self) -> DatabaseResult<u64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM history", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn max_recency(&self) -> DatabaseResult<i64> {
        let conn = self.get_conn()?;
        let max: Option<i64> = conn.query_row("SELECT MAX(recency) FROM history", [], |row| row.get(0))?;
        Ok(max.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(text: &str, recency: i64) -> Entry {
        Entry {
            recency,
            usage_count: 1,
            ..Entry::new_text(text)
        }
    }

    #[test]
    fn test_insert_and_find() {
        let db = Database::open_in_memory().unwrap();
        let mut item = entry("Hello World", 1);
        item.tag = Some('h');
        item.masked = true;
        let id = db.insert(&item).unwrap();

        let stored = db.find_by_id(id).unwrap().unwrap();
        assert_eq!(stored.text, "Hello World");
        assert_eq!(stored.tag, Some('h'));
        assert!(stored.masked);
        assert_eq!(stored.usage_count, 1);
        assert_eq!(db.find_by_text("Hello World").unwrap().unwrap().id, Some(id));
        assert_eq!(db.find_by_tag('h').unwrap().unwrap().id, Some(id));
    }

    #[test]
    fn test_duplicate_text_is_constraint_violation() {
        let db = Database::open_in_memory().unwrap();
        db.insert(&entry("dup", 1)).unwrap();
        assert!(matches!(db.insert(&entry("dup", 2)), Err(DatabaseError::Constraint(_))));
    }

    #[test]
    fn test_duplicate_tag_is_constraint_violation() {
        let db = Database::open_in_memory().unwrap();
        let mut a = entry("a", 1);
        a.tag = Some('q');
        db.insert(&a).unwrap();
        let mut b = entry("b", 2);
        b.tag = Some('q');
        assert!(matches!(db.insert(&b), Err(DatabaseError::Constraint(_))));

        // Untagged rows never collide
        db.insert(&entry("c", 3)).unwrap();
        db.insert(&entry("d", 4)).unwrap();
    }

    #[test]
    fn test_update_and_delete_missing() {
        let db = Database::open_in_memory().unwrap();
        let mut ghost = entry("ghost", 1);
        ghost.id = Some(99);
        assert!(matches!(db.update(&ghost), Err(DatabaseError::NotFound(99))));
        assert!(matches!(db.delete(99), Err(DatabaseError::NotFound(99))));
    }

    #[test]
    fn test_update_displacing_rolls_back_on_conflict() {
        let db = Database::open_in_memory().unwrap();
        let holder = db.insert(&entry("taken", 1)).unwrap();
        let mut tagged = entry("tagged", 2);
        tagged.tag = Some('t');
        db.insert(&tagged).unwrap();
        let id = db.insert(&entry("mover", 3)).unwrap();

        let mut mover = db.find_by_id(id).unwrap().unwrap();
        mover.text = "taken".into();
        mover.tag = Some('t');
        assert!(matches!(db.update_displacing(&mover, Some(holder)), Err(DatabaseError::Constraint(_))));
        assert_eq!(db.find_by_id(holder).unwrap().unwrap().text, "taken");
        assert_eq!(db.count().unwrap(), 3);

        mover.tag = None;
        db.update_displacing(&mover, Some(holder)).unwrap();
        assert!(db.find_by_id(holder).unwrap().is_none());
        assert_eq!(db.find_by_text("taken").unwrap().unwrap().id, Some(id));
    }

    #[test]
    fn test_ordering_and_eviction_queries() {
        let db = Database::open_in_memory().unwrap();
        db.insert(&entry("oldest", 1)).unwrap();
        db.insert(&entry("middle", 2)).unwrap();
        let newest_id = db.insert(&entry("newest", 3)).unwrap();

        let texts: Vec<String> = db.fetch_ordered(None).unwrap().into_iter().map(|e| e.text).collect();
        assert_eq!(texts, vec!["newest", "middle", "oldest"]);
        assert_eq!(db.fetch_ordered(Some(2)).unwrap().len(), 2);
        assert_eq!(db.max_recency().unwrap(), 3);

        // Promote the oldest: it is now both most used and most recent
        let mut oldest = db.find_by_text("oldest").unwrap().unwrap();
        oldest.usage_count = 2;
        oldest.recency = 4;
        db.update(&oldest).unwrap();
        assert_eq!(db.eviction_candidate().unwrap().unwrap().text, "middle");

        let mut newest = db.find_by_id(newest_id).unwrap().unwrap();
        newest.locked = true;
        db.update(&newest).unwrap();
        assert_eq!(db.newest_unlocked().unwrap().unwrap().text, "oldest");
        assert_eq!(db.delete_unlocked().unwrap(), 2);
        assert_eq!(db.count().unwrap(), 1);
    }

    #[test]
    fn test_empty_database() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.count().unwrap(), 0);
        assert_eq!(db.max_recency().unwrap(), 0);
        assert!(db.eviction_candidate().unwrap().is_none());
        assert!(db.database_size().unwrap() > 0);
    }

    #[test]
    fn test_timestamp_roundtrip() {
        let ts = 1_700_000_000;
        assert_eq!(parse_db_timestamp(&format_db_timestamp(ts)).timestamp(), ts);
        assert_eq!(parse_db_timestamp("2024-01-02 03:04:05").timestamp(), 1_704_164_645);
    }
}
