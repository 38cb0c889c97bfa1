use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::detection::DetectionParams;

/// Configuration for logstory
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Burst detection thresholds
    pub detection: DetectionConfig,
    /// Narrative generation service
    pub narrative: NarrativeConfig,
    /// Playbook recommendation lookup
    pub recommendations: RecommendationConfig,
    /// Analysis history storage
    pub storage: StorageConfig,
    /// Output configuration
    pub output: OutputConfig,
    /// Live tailing configuration
    pub watch: WatchConfig,
}

/// Burst detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Failures within the window needed to report a burst
    pub failed_threshold: i64,
    /// Sliding window length in minutes
    pub window_minutes: i64,
}

/// Narrative generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeConfig {
    /// When false the finding digest is used as the narrative unchanged
    pub enabled: bool,
    /// Endpoint accepting `{"prompt", "max_tokens"}` and returning `{"text"}`
    pub api_url: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    pub max_tokens: u32,
}

/// Recommendation lookup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationConfig {
    /// Markdown playbook split into `##` sections
    pub playbook_path: PathBuf,
    /// Number of sections returned per analysis
    pub top_k: usize,
}

/// History storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path
    pub db_path: PathBuf,
    /// Default number of analyses listed by `history`
    pub history_limit: usize,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output format: "json", "jsonl", or "console"
    pub format: String,
    /// Output file path (stdout when absent)
    pub file_path: Option<PathBuf>,
}

/// Live tailing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Auth log to follow
    pub file_path: PathBuf,
    /// Replay the existing contents before following new lines
    #[serde(default)]
    pub from_start: bool,
    /// Delay between polls for new lines
    pub poll_interval_ms: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        let params = DetectionParams::default();
        DetectionConfig {
            failed_threshold: params.failed_threshold,
            window_minutes: params.window_minutes,
        }
    }
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        NarrativeConfig {
            enabled: true,
            api_url: "https://generativelanguage.googleapis.com/v1/narrative".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            timeout_secs: 30,
            max_tokens: 256,
        }
    }
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        RecommendationConfig {
            playbook_path: PathBuf::from("playbook.md"),
            top_k: 3,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            db_path: PathBuf::from("data.db"),
            history_limit: 50,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            format: "json".to_string(),
            file_path: None,
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        WatchConfig {
            file_path: PathBuf::from("/var/log/auth.log"),
            from_start: false,
            poll_interval_ms: 100,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            detection: DetectionConfig::default(),
            narrative: NarrativeConfig::default(),
            recommendations: RecommendationConfig::default(),
            storage: StorageConfig::default(),
            output: OutputConfig::default(),
            watch: WatchConfig::default(),
        }
    }
}

impl DetectionConfig {
    pub fn params(&self) -> DetectionParams {
        DetectionParams::new(self.failed_threshold, self.window_minutes)
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load from a file when it exists, otherwise fall back to defaults
    pub fn load_or_default(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            Self::from_file(path)
        } else {
            log::warn!("Config file {:?} not found, using defaults", path);
            Ok(Config::default())
        }
    }

    /// Save configuration to a file
    pub fn to_file(&self, path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}
