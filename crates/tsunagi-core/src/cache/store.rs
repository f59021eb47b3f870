use std::path::Path;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::{CacheStats, QueryShape};
use crate::error::TsunagiError;

const SCHEMA_V1: &str = include_str!("../../../../migrations/001_query_cache.sql");

/// SQLite-backed document table behind [`super::SqliteCache`].
pub struct CacheStore {
    conn: Connection,
}

impl CacheStore {
    /// Open (or create) the database at the given path and run migrations.
    pub fn open(path: &Path) -> Result<Self, TsunagiError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, TsunagiError> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Fresh document for the slot, if any.
    pub fn get(&self, shape: QueryShape, key: &str) -> Result<Option<String>, TsunagiError> {
        self.conn
            .query_row(
                "SELECT document FROM query_cache
                 WHERE shape = ?1 AND variables = ?2 AND stale = 0",
                params![shape.as_str(), key],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn put(&self, shape: QueryShape, key: &str, document: &str) -> Result<(), TsunagiError> {
        self.conn.execute(
            "INSERT INTO query_cache (shape, variables, document, stale, updated_at)
             VALUES (?1, ?2, ?3, 0, ?4)
             ON CONFLICT(shape, variables) DO UPDATE SET
                document = excluded.document,
                stale = 0,
                updated_at = excluded.updated_at",
            params![shape.as_str(), key, document, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Mark every slot of `shape` stale, or only the one matching `key`.
    pub fn mark_stale(&self, shape: QueryShape, key: Option<&str>) -> Result<usize, TsunagiError> {
        let marked = match key {
            Some(key) => self.conn.execute(
                "UPDATE query_cache SET stale = 1 WHERE shape = ?1 AND variables = ?2",
                params![shape.as_str(), key],
            )?,
            None => self.conn.execute(
                "UPDATE query_cache SET stale = 1 WHERE shape = ?1",
                params![shape.as_str()],
            )?,
        };
        Ok(marked)
    }

    pub fn clear(&self) -> Result<usize, TsunagiError> {
        Ok(self.conn.execute("DELETE FROM query_cache", [])?)
    }

    pub fn stats(&self) -> Result<CacheStats, TsunagiError> {
        self.conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(stale), 0) FROM query_cache",
                [],
                |row| {
                    Ok(CacheStats {
                        documents: row.get::<_, i64>(0)? as usize,
                        stale: row.get::<_, i64>(1)? as usize,
                    })
                },
            )
            .map_err(Into::into)
    }
}

fn run_migrations(conn: &Connection) -> Result<(), TsunagiError> {
    let version: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        conn.execute_batch(SCHEMA_V1)?;
        conn.pragma_update(None, "user_version", 1)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_and_get() {
        let store = CacheStore::open_memory().unwrap();
        store.put(QueryShape::AnimePage, r#"{"id":1}"#, "{}").unwrap();

        assert_eq!(
            store.get(QueryShape::AnimePage, r#"{"id":1}"#).unwrap().as_deref(),
            Some("{}")
        );
        assert!(store.get(QueryShape::ListEntry, r#"{"id":1}"#).unwrap().is_none());
    }

    #[test]
    fn test_put_overwrites_and_refreshes() {
        let store = CacheStore::open_memory().unwrap();
        store.put(QueryShape::ListEntries, "{}", "[1]").unwrap();
        assert_eq!(store.mark_stale(QueryShape::ListEntries, None).unwrap(), 1);
        assert!(store.get(QueryShape::ListEntries, "{}").unwrap().is_none());

        store.put(QueryShape::ListEntries, "{}", "[2]").unwrap();
        assert_eq!(
            store.get(QueryShape::ListEntries, "{}").unwrap().as_deref(),
            Some("[2]")
        );
        assert_eq!(store.stats().unwrap(), CacheStats { documents: 1, stale: 0 });
    }

    #[test]
    fn test_mark_stale_single_key() {
        let store = CacheStore::open_memory().unwrap();
        store.put(QueryShape::EpisodeList, "a", "[]").unwrap();
        store.put(QueryShape::EpisodeList, "b", "[]").unwrap();

        assert_eq!(store.mark_stale(QueryShape::EpisodeList, Some("a")).unwrap(), 1);
        assert_eq!(store.stats().unwrap(), CacheStats { documents: 2, stale: 1 });
        assert_eq!(store.clear().unwrap(), 2);
        assert_eq!(store.stats().unwrap(), CacheStats::default());
    }

    #[test]
    fn test_reopen_keeps_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        {
            let store = CacheStore::open(&path).unwrap();
            store.put(QueryShape::AnimePage, "k", "{\"a\":1}").unwrap();
        }
        let store = CacheStore::open(&path).unwrap();
        assert_eq!(
            store.get(QueryShape::AnimePage, "k").unwrap().as_deref(),
            Some("{\"a\":1}")
        );
    }
}
