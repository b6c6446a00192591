//! Article input files
//!
//! Either a JSON array of articles or one JSON object per line. Each article
//! carries the paragraph lists of both language versions:
//!
//! ```json
//! {"id": "g77", "url": "https://...", "english": ["Title", "..."], "khmer": ["...", "..."]}
//! ```
//!
//! `a`/`b` are accepted as well as `english`/`khmer`.

use crate::error::{AlignError, AlignResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One bilingual article
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(alias = "english")]
    pub a: Vec<String>,
    #[serde(alias = "khmer")]
    pub b: Vec<String>,
}

impl ArticleInput {
    pub fn new(a: Vec<String>, b: Vec<String>) -> Self {
        Self {
            id: None,
            url: None,
            a,
            b,
        }
    }

    /// Identifier for logs: id, then url, then position
    pub fn label(&self, index: usize) -> String {
        self.id
            .clone()
            .or_else(|| self.url.clone())
            .unwrap_or_else(|| format!("#{}", index))
    }
}

/// Parse articles from file content
///
/// # Errors
/// `InputMismatch` when the content is not a list of articles, or a
/// paragraph is not a string.
pub fn parse_articles(content: &str) -> AlignResult<Vec<ArticleInput>> {
    let trimmed = content.trim_start();

    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed)
            .map_err(|e| AlignError::InputMismatch(format!("invalid article list: {}", e)));
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line).map_err(|e| {
                AlignError::InputMismatch(format!("invalid article on line {}: {}", n + 1, e))
            })
        })
        .collect()
}

/// Read and parse an article file
pub fn load_articles(path: &Path) -> AlignResult<Vec<ArticleInput>> {
    let content = std::fs::read_to_string(path)?;
    let articles = parse_articles(&content)?;

    tracing::info!(
        path = %path.display(),
        articles = articles.len(),
        "Loaded articles"
    );

    Ok(articles)
}
