use crate::analysis::AnalysisReport;
use crate::models::Finding;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Output handler for findings and analysis reports
pub struct OutputHandler {
    format: OutputFormat,
    writer: Option<Box<dyn Write + Send>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Jsonl,
    Console,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "jsonl" => OutputFormat::Jsonl,
            "console" => OutputFormat::Console,
            _ => OutputFormat::Jsonl, // Default
        }
    }
}

impl OutputHandler {
    /// Create a handler writing to stdout, or appending to `file_path`
    pub fn new(
        format: OutputFormat,
        file_path: Option<PathBuf>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        match file_path {
            Some(path) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                Ok(Self::with_writer(format, Box::new(BufWriter::new(file))))
            }
            None => Ok(OutputHandler {
                format,
                writer: None,
            }),
        }
    }

    /// Handler over an arbitrary writer
    pub fn with_writer(format: OutputFormat, writer: Box<dyn Write + Send>) -> Self {
        OutputHandler {
            format,
            writer: Some(writer),
        }
    }

    /// Write a single finding
    pub fn write_finding(&mut self, finding: &Finding) -> Result<(), Box<dyn std::error::Error>> {
        let output = match self.format {
            OutputFormat::Json => format!("{}\n", serde_json::to_string_pretty(finding)?),
            OutputFormat::Jsonl => format!("{}\n", serde_json::to_string(finding)?),
            OutputFormat::Console => format!("{}\n", finding),
        };
        self.write_output(&output)
    }

    /// Write a complete analysis report
    pub fn write_report(&mut self, report: &AnalysisReport) -> Result<(), Box<dyn std::error::Error>> {
        let output = match self.format {
            OutputFormat::Json => format!("{}\n", serde_json::to_string_pretty(report)?),
            OutputFormat::Jsonl => format!("{}\n", serde_json::to_string(report)?),
            OutputFormat::Console => Self::render_report(report),
        };
        self.write_output(&output)
    }

    fn render_report(report: &AnalysisReport) -> String {
        let mut out = String::new();
        if let Some(id) = report.id {
            out.push_str(&format!("Analysis #{}\n", id));
        }
        out.push_str(&format!(
            "Events: {} ({} failed, {} accepted) from {} IP(s), {} user(s)\n",
            report.summary.total_events,
            report.summary.failed_attempts,
            report.summary.successful_logins,
            report.summary.unique_ips,
            report.summary.unique_users
        ));

        out.push_str("\nFindings:\n");
        if report.findings.is_empty() {
            out.push_str("  none\n");
        }
        for finding in &report.findings {
            out.push_str(&format!("  {}\n", finding));
        }

        out.push_str(&format!("\nNarrative:\n  {}\n", report.narrative));

        if !report.recommendations.is_empty() {
            out.push_str("\nRecommendations:\n");
            for rec in &report.recommendations {
                out.push_str(&format!("  - {}\n", rec.title));
            }
        }
        out
    }

    fn write_output(&mut self, data: &str) -> Result<(), Box<dyn std::error::Error>> {
        match &mut self.writer {
            Some(writer) => {
                writer.write_all(data.as_bytes())?;
                writer.flush()?;
            }
            None => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(data.as_bytes())?;
                stdout.flush()?;
            }
        }
        Ok(())
    }

    /// Flush any buffered output
    pub fn flush(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(writer) = &mut self.writer {
            writer.flush()?;
        }
        Ok(())
    }
}
