//! SQLite implementation of the AnalysisStore trait

use super::{AnalysisStore, PersistenceError};
use crate::models::{AnalysisRecord, Recommendation};
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite-based analysis history
pub struct SqliteAnalysisStore {
    conn: Mutex<Connection>,
}

impl SqliteAnalysisStore {
    /// Open (or create) a store at the specified path and apply the schema
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, PersistenceError> {
        let conn = Connection::open(db_path)?;
        let store = SqliteAnalysisStore {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create an in-memory SQLite database (useful for testing)
    pub fn in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory()?;
        let store = SqliteAnalysisStore {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<(), PersistenceError> {
        let conn = self.lock()?;
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, PersistenceError> {
        self.conn.lock().map_err(|_| PersistenceError::LockPoisoned)
    }

    fn row_to_record(
        row: &rusqlite::Row<'_>,
    ) -> rusqlite::Result<(i64, String, String, String, String)> {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
    }

    fn decode(
        (id, source, narrative, recs, created_at): (i64, String, String, String, String),
    ) -> Result<AnalysisRecord, PersistenceError> {
        let recommendations: Vec<Recommendation> = if recs.is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&recs).map_err(|e| {
                PersistenceError::InvalidData(format!(
                    "Recommendations for analysis {} are not valid JSON: {}",
                    id, e
                ))
            })?
        };

        Ok(AnalysisRecord {
            id,
            source,
            narrative,
            recommendations,
            created_at,
        })
    }
}

impl AnalysisStore for SqliteAnalysisStore {
    fn save_analysis(
        &self,
        source: &str,
        narrative: &str,
        recommendations: &[Recommendation],
    ) -> Result<i64, PersistenceError> {
        let recs = serde_json::to_string(recommendations)?;
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO analyses (source, narrative, recommendations, created_at)
             VALUES (?, ?, ?, ?)",
            params![source, narrative, recs, created_at],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn list_analyses(&self, limit: usize) -> Result<Vec<AnalysisRecord>, PersistenceError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, source, narrative, recommendations, created_at
             FROM analyses
             ORDER BY created_at DESC, id DESC
             LIMIT ?",
        )?;

        let rows = stmt
            .query_map(params![limit as i64], Self::row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(Self::decode).collect()
    }

    fn get_analysis(&self, id: i64) -> Result<Option<AnalysisRecord>, PersistenceError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, source, narrative, recommendations, created_at
             FROM analyses WHERE id = ?",
        )?;

        match stmt.query_row(params![id], Self::row_to_record) {
            Ok(row) => Ok(Some(Self::decode(row)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn clear_all(&self) -> Result<(), PersistenceError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM analyses", [])?;
        Ok(())
    }
}
