//! Narrative generation for analysis results
//!
//! Turns the finding digest into a readable incident narrative using an
//! external text-generation endpoint. Generation is best effort: any failure
//! (missing key, network error, malformed reply) yields the digest verbatim.

use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

use crate::config::NarrativeConfig;
use crate::models::Finding;

/// Digest used when no findings were produced
pub const NO_FINDINGS_DIGEST: &str = "No significant security patterns detected.";

/// Errors that can occur while calling the generation service
///
/// These never escape [`NarrativeClient::generate`]; they are logged and
/// replaced by the fallback.
#[derive(Error, Debug)]
pub enum NarrativeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("API key not configured (set {0})")]
    MissingApiKey(String),

    #[error("Response did not contain generated text")]
    MalformedResponse,
}

/// Join finding descriptions into the plain-text prompt for generation
pub fn build_digest(findings: &[Finding]) -> String {
    if findings.is_empty() {
        return NO_FINDINGS_DIGEST.to_string();
    }

    findings
        .iter()
        .map(Finding::description)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Client for the narrative generation endpoint
pub struct NarrativeClient {
    config: NarrativeConfig,
    api_key: Option<String>,
    client: Client,
}

impl NarrativeClient {
    /// Create a client, reading the API key from the configured environment variable
    pub fn new(config: NarrativeConfig) -> Self {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        Self::with_api_key(config, api_key)
    }

    /// Create a client with an explicit API key
    pub fn with_api_key(config: NarrativeConfig, api_key: Option<String>) -> Self {
        let client = match Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                log::warn!(
                    "Could not build narrative HTTP client with a {}s timeout, using defaults: {}",
                    config.timeout_secs,
                    e
                );
                Client::new()
            }
        };

        NarrativeClient {
            config,
            api_key,
            client,
        }
    }

    /// Generate a narrative for `prompt`, falling back to the prompt itself
    pub async fn generate(&self, prompt: &str) -> String {
        if prompt.is_empty() {
            return String::new();
        }
        if !self.config.enabled {
            return prompt.to_string();
        }

        match self.request(prompt).await {
            Ok(text) => text,
            Err(NarrativeError::MissingApiKey(var)) => {
                log::debug!("Narrative generation skipped, {} not set", var);
                prompt.to_string()
            }
            Err(e) => {
                log::warn!("Narrative generation failed, using digest: {}", e);
                prompt.to_string()
            }
        }
    }

    async fn request(&self, prompt: &str) -> Result<String, NarrativeError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| NarrativeError::MissingApiKey(self.config.api_key_env.clone()))?;

        let payload = serde_json::json!({
            "prompt": prompt,
            "max_tokens": self.config.max_tokens,
        });

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        let body: serde_json::Value = serde_json::from_slice(&response.bytes().await?)?;
        extract_text(&body).ok_or(NarrativeError::MalformedResponse)
    }
}

/// Pull non-empty generated text out of a `{"text": ...}` reply
fn extract_text(body: &serde_json::Value) -> Option<String> {
    body.get("text")
        .and_then(|t| t.as_str())
        .filter(|t| !t.trim().is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TargetKind;
    use chrono::NaiveDate;

    fn test_config(url: &str) -> NarrativeConfig {
        NarrativeConfig {
            enabled: true,
            api_url: url.to_string(),
            api_key_env: "LOGSTORY_TEST_UNSET_KEY".to_string(),
            timeout_secs: 2,
            max_tokens: 64,
        }
    }

    #[test]
    fn test_digest_without_findings() {
        assert_eq!(build_digest(&[]), NO_FINDINGS_DIGEST);
    }

    #[test]
    fn test_digest_joins_descriptions() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        let findings = vec![
            Finding::BruteForceBurst {
                target_kind: TargetKind::Ip,
                target_value: "1.2.3.4".to_string(),
                count: 5,
                window_start: ts,
                window_end: ts,
            },
            Finding::PostFailureSuccess {
                source_address: "1.2.3.4".to_string(),
                user: "root".to_string(),
                success_time: ts,
                preceding_failure_count: 5,
            },
        ];

        let digest = build_digest(&findings);
        assert_eq!(
            digest,
            format!("{} {}", findings[0].description(), findings[1].description())
        );
    }

    #[test]
    fn test_extract_text() {
        let body = serde_json::json!({"text": "An attacker hammered root."});
        assert_eq!(extract_text(&body).as_deref(), Some("An attacker hammered root."));

        assert!(extract_text(&serde_json::json!({"text": "  "})).is_none());
        assert!(extract_text(&serde_json::json!({"choices": []})).is_none());
        assert!(extract_text(&serde_json::json!({"text": 7})).is_none());
    }

    #[test]
    fn test_missing_key_falls_back() {
        let client = NarrativeClient::new(test_config("http://127.0.0.1:9/"));
        let narrative = tokio_test::block_on(client.generate("3 failed logins"));
        assert_eq!(narrative, "3 failed logins");
    }

    #[test]
    fn test_empty_prompt() {
        let client = NarrativeClient::with_api_key(test_config("http://127.0.0.1:9/"), Some("k".into()));
        assert_eq!(tokio_test::block_on(client.generate("")), "");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_falls_back() {
        // port 9 (discard) is closed on test hosts, the connection is refused
        let client = NarrativeClient::with_api_key(test_config("http://127.0.0.1:9/"), Some("k".into()));
        assert_eq!(client.generate("digest text").await, "digest text");
    }

    #[tokio::test]
    async fn test_disabled_returns_prompt() {
        let mut config = test_config("http://127.0.0.1:9/");
        config.enabled = false;
        let client = NarrativeClient::with_api_key(config, Some("k".into()));
        assert_eq!(client.generate("digest text").await, "digest text");
    }
}
