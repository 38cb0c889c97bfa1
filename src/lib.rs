pub mod analysis;
pub mod config;
pub mod detection;
pub mod input;
pub mod models;
pub mod narrative;
pub mod output;
pub mod persistence;
pub mod recommend;

// Re-export commonly used types
pub use analysis::{AnalysisReport, Analyzer};
pub use detection::{detect_findings, DetectionParams, StreamingDetector};
pub use input::extract_events;
pub use models::{AuthEvent, EventKind, Finding, TargetKind};
pub use narrative::NarrativeClient;
pub use persistence::{AnalysisStore, SqliteAnalysisStore};
pub use recommend::{Playbook, Ranker, TermOverlapRanker};
