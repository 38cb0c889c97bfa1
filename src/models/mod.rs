pub mod analysis;
pub mod event;
pub mod finding;

pub use analysis::{AnalysisRecord, Recommendation};
pub use event::{AuthEvent, EventKind};
pub use finding::{Finding, TargetKind};
