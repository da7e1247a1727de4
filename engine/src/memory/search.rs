//! Token-overlap relevance scoring
//!
//! A fragment is a candidate when every lowercase query token occurs as a
//! substring of its content, or when the content contains the raw query.
//! Score is the share of query tokens that appear as whole words. There is
//! no length normalisation; ties fall back to insertion order.

use super::record::Fragment;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;

/// A ranked search hit.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredFragment {
    pub fragment: Fragment,
    pub score: f64,
    /// Global insertion sequence, used only for tie-breaking
    #[serde(skip)]
    pub(crate) sequence: u64,
}

/// Precomputed query used while scanning partitions.
#[derive(Debug, Clone)]
pub struct QueryMatcher {
    raw: String,
    tokens: Vec<String>,
}

impl QueryMatcher {
    pub fn new(text: &str) -> Self {
        let raw = text.trim().to_lowercase();
        let tokens = raw.split_whitespace().map(str::to_string).collect();
        Self { raw, tokens }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Returns the relevance score when `content` is a candidate.
    pub fn score(&self, content: &str) -> Option<f64> {
        if self.tokens.is_empty() {
            return None;
        }
        let haystack = content.to_lowercase();

        let all_tokens = self.tokens.iter().all(|t| haystack.contains(t.as_str()));
        if !all_tokens && !haystack.contains(self.raw.as_str()) {
            return None;
        }

        let words: HashSet<&str> = haystack
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|w| !w.is_empty())
            .collect();
        let found = self
            .tokens
            .iter()
            .filter(|t| words.contains(t.trim_matches(|c: char| !c.is_alphanumeric())))
            .count();

        Some(found as f64 / self.tokens.len() as f64)
    }
}

/// Sorts by score descending, then insertion order, and truncates.
pub fn rank(mut hits: Vec<ScoredFragment>, limit: usize) -> Vec<ScoredFragment> {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.sequence.cmp(&b.sequence))
    });
    hits.truncate(limit);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_requires_every_token_as_substring() {
        let m = QueryMatcher::new("Tokyo Budget");
        assert!(m.score("Budget trip to Tokyo").is_some());
        assert!(m.score("Trip to Tokyo").is_none());
    }

    #[test]
    fn substring_matches_score_below_whole_words() {
        let m = QueryMatcher::new("temple tokyo");
        let whole = m.score("Senso-ji temple, Tokyo.").unwrap();
        let partial = m.score("Temples across Tokyo").unwrap();
        assert_eq!(whole, 1.0);
        assert_eq!(partial, 0.5);
    }

    #[test]
    fn blank_query_matches_nothing() {
        assert!(QueryMatcher::new("   ").score("anything").is_none());
    }
}
