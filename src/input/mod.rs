pub mod extractor;
pub mod file_tailer;

pub use extractor::{extract_events, extract_events_from_bytes, extract_events_with_year, parse_line};
pub use file_tailer::FileTailer;
