use serde::{Deserialize, Serialize};

/// One playbook section offered as a response recommendation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
    pub content: String,
}

/// A stored analysis, as listed in history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: i64,
    /// Identifier of the analysed input (usually the uploaded file path)
    pub source: String,
    pub narrative: String,
    pub recommendations: Vec<Recommendation>,
    /// RFC 3339, UTC
    pub created_at: String,
}
