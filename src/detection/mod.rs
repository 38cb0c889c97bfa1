pub mod burst;
pub mod stream;

pub use burst::{detect_findings, detect_with_params, DetectionParams};
pub use stream::StreamingDetector;
