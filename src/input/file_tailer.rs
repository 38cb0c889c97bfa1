use chrono::{Datelike, Local};
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::PathBuf;

use super::extractor::parse_line;
use crate::models::AuthEvent;

/// Tail an auth log file and extract events from newly appended lines
pub struct FileTailer {
    file_path: PathBuf,
    reader: Option<BufReader<File>>,
    file_position: u64,
    from_start: bool,
    partial: String,
}

impl FileTailer {
    /// Create a tailer that starts at the current end of the file
    pub fn new(file_path: PathBuf) -> Self {
        FileTailer {
            file_path,
            reader: None,
            file_position: 0,
            from_start: false,
            partial: String::new(),
        }
    }

    /// Create a tailer that first replays the existing file contents
    pub fn from_start(file_path: PathBuf) -> Self {
        FileTailer {
            from_start: true,
            ..Self::new(file_path)
        }
    }

    /// Open the file and position the reader
    pub fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let file = File::open(&self.file_path)?;
        let mut reader = BufReader::new(file);

        if !self.from_start {
            reader.seek(SeekFrom::End(0))?;
        }
        self.file_position = reader.stream_position()?;
        self.reader = Some(reader);

        log::info!(
            "Tailing {:?} from byte {}",
            self.file_path,
            self.file_position
        );
        Ok(())
    }

    /// Read events from lines appended since the last call
    ///
    /// A trailing line without a newline is held back until it is completed.
    pub fn read_events(&mut self) -> Result<Vec<AuthEvent>, Box<dyn std::error::Error>> {
        if self.reader.is_none() {
            self.initialize()?;
        }

        let reader = self.reader.as_mut().ok_or("Reader not initialized")?;
        let year = Local::now().year();
        let mut events = Vec::new();

        loop {
            let mut buf = Vec::new();
            let bytes_read = reader.read_until(b'\n', &mut buf)?;

            if bytes_read == 0 {
                break; // EOF
            }

            self.file_position += bytes_read as u64;
            self.partial.push_str(&String::from_utf8_lossy(&buf));

            if !self.partial.ends_with('\n') {
                continue;
            }

            let line = std::mem::take(&mut self.partial);
            if let Some(event) = parse_line(line.trim_end_matches(['\r', '\n']), year) {
                events.push(event);
            }
        }

        Ok(events)
    }

    /// Byte offset consumed so far
    pub fn position(&self) -> u64 {
        self.file_position
    }

    /// Check if the file still exists and is readable
    pub fn is_valid(&self) -> bool {
        self.file_path.exists()
    }
}
