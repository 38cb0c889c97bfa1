//! Playbook recommendation lookup
//!
//! A playbook is a markdown document split into `##` sections. Given the
//! analysis narrative, a [`Ranker`] picks the most relevant sections.

use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::models::Recommendation;

#[derive(Error, Debug)]
pub enum PlaybookError {
    #[error("IO error reading playbook: {0}")]
    Io(#[from] std::io::Error),
}

/// Parsed set of playbook sections
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Playbook {
    pub sections: Vec<Recommendation>,
}

impl Playbook {
    /// Split markdown on `##`; each section's first line is its title
    pub fn parse(markdown: &str) -> Self {
        let sections = markdown
            .split("##")
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                let mut lines = part.lines();
                let title = lines.next().unwrap_or_default().trim().to_string();
                let content = lines.collect::<Vec<_>>().join("\n").trim().to_string();
                Recommendation { title, content }
            })
            .collect();

        Playbook { sections }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PlaybookError> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    /// Load a playbook, treating a missing or unreadable file as empty
    pub fn load_or_empty<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(&path) {
            Ok(playbook) => playbook,
            Err(e) => {
                log::warn!(
                    "Playbook {:?} unavailable, no recommendations: {}",
                    path.as_ref(),
                    e
                );
                Playbook::default()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// Ranks playbook sections against a query text
pub trait Ranker: Send + Sync {
    fn rank(&self, query: &str, docs: &[Recommendation], top_k: usize) -> Vec<Recommendation>;
}

/// Cosine similarity over lower-cased term frequencies
#[derive(Debug, Clone, Copy, Default)]
pub struct TermOverlapRanker;

impl TermOverlapRanker {
    fn term_frequencies(text: &str) -> HashMap<String, f64> {
        let mut tf = HashMap::new();
        for term in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() > 1)
        {
            *tf.entry(term.to_lowercase()).or_insert(0.0) += 1.0;
        }
        tf
    }

    fn cosine(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
        let dot: f64 = a
            .iter()
            .filter_map(|(term, wa)| b.get(term).map(|wb| wa * wb))
            .sum();
        let norm_a = a.values().map(|w| w * w).sum::<f64>().sqrt();
        let norm_b = b.values().map(|w| w * w).sum::<f64>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            0.0
        } else {
            dot / (norm_a * norm_b)
        }
    }
}

impl Ranker for TermOverlapRanker {
    fn rank(&self, query: &str, docs: &[Recommendation], top_k: usize) -> Vec<Recommendation> {
        let query_tf = Self::term_frequencies(query);

        let mut scored: Vec<(usize, f64)> = docs
            .iter()
            .enumerate()
            .map(|(i, doc)| {
                let doc_tf = Self::term_frequencies(&format!("{}\n{}", doc.title, doc.content));
                (i, Self::cosine(&query_tf, &doc_tf))
            })
            .collect();

        // stable: equal scores keep playbook order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        scored
            .into_iter()
            .take(top_k)
            .map(|(i, _)| docs[i].clone())
            .collect()
    }
}
