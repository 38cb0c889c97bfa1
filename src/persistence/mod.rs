//! Persistence module for analysis history
//!
//! Stores the narrative and recommendations produced for each analysed log
//! so past results can be listed and retrieved. The detection core never
//! touches a store; the handle is passed explicitly to the analysis pipeline.

pub mod sqlite_store;

pub use sqlite_store::SqliteAnalysisStore;

use crate::models::{AnalysisRecord, Recommendation};
use thiserror::Error;

/// Errors that can occur during persistence operations
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid data in database: {0}")]
    InvalidData(String),

    #[error("Database connection lock poisoned")]
    LockPoisoned,
}

/// Trait for analysis history backends
pub trait AnalysisStore: Send + Sync {
    /// Store a finished analysis and return its id
    fn save_analysis(
        &self,
        source: &str,
        narrative: &str,
        recommendations: &[Recommendation],
    ) -> Result<i64, PersistenceError>;

    /// List stored analyses, newest first
    fn list_analyses(&self, limit: usize) -> Result<Vec<AnalysisRecord>, PersistenceError>;

    /// Fetch a single analysis by id
    fn get_analysis(&self, id: i64) -> Result<Option<AnalysisRecord>, PersistenceError>;

    /// Remove all stored analyses
    fn clear_all(&self) -> Result<(), PersistenceError>;
}
