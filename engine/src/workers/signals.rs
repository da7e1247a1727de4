//! Signals extracted from remembered text
//!
//! Worker summaries are written with fixed labels (`Etiquette:`,
//! `Must visit:`, `Total estimated cost:`, `Verified activities:`) so these
//! patterns can read them back. Listed values are separated by `; ` so names
//! may carry commas and abbreviations ("St. Peter's Basilica").

use regex::Regex;
use std::sync::OnceLock;

/// Separator for the labelled lists workers write.
pub const LIST_SEPARATOR: &str = "; ";

struct Patterns {
    etiquette: Regex,
    must_visit: Regex,
    total_cost: Regex,
    verified: Regex,
    days: Regex,
    travelers: Regex,
}

static PATTERNS: OnceLock<Patterns> = OnceLock::new();

/// A labelled list runs until a period that ends the text or line, or that
/// is followed by the next `Label:`.
fn labelled(label: &str) -> String {
    format!(r"(?im){label}:\s*(.+?)(?:\.\s+[a-z][a-z ]*:|\.?\s*$)")
}

fn patterns() -> &'static Patterns {
    PATTERNS.get_or_init(|| Patterns {
        etiquette: Regex::new(&labelled("etiquette")).expect("Invalid etiquette pattern"),
        must_visit: Regex::new(&labelled("must visit")).expect("Invalid must-visit pattern"),
        total_cost: Regex::new(r"(?i)total estimated cost:\s*(\d+)")
            .expect("Invalid total cost pattern"),
        verified: Regex::new(&labelled("verified activities")).expect("Invalid verified pattern"),
        days: Regex::new(r"(?i)\b(\d+)[ -]day trip\b").expect("Invalid day count pattern"),
        travelers: Regex::new(r"(?i)\b(\d+) travell?ers?\b").expect("Invalid traveler pattern"),
    })
}

/// Joins values the way [`etiquette`] and friends read them back.
pub fn join_list<S: AsRef<str>>(values: &[S]) -> String {
    values
        .iter()
        .map(|v| v.as_ref().trim())
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}

fn list_after(pattern: &Regex, content: &str) -> Vec<String> {
    pattern
        .captures_iter(content)
        .filter_map(|c| c.get(1))
        .flat_map(|m| m.as_str().split(';'))
        .map(|s| s.trim().trim_end_matches('.').trim_end())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

pub fn etiquette(content: &str) -> Vec<String> {
    list_after(&patterns().etiquette, content)
}

pub fn must_visit(content: &str) -> Vec<String> {
    list_after(&patterns().must_visit, content)
}

pub fn verified_activities(content: &str) -> Vec<String> {
    list_after(&patterns().verified, content)
}

pub fn total_estimated_cost(content: &str) -> Option<f64> {
    patterns()
        .total_cost
        .captures(content)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// `"<label>: a; b."`, or nothing when `values` is empty.
pub fn labelled_list<S: AsRef<str>>(label: &str, values: &[S]) -> Option<String> {
    (!values.is_empty()).then(|| format!("{}: {}.", label, join_list(values)))
}

fn first_number(pattern: &Regex, content: &str) -> Option<u32> {
    pattern
        .captures(content)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .filter(|n| *n > 0)
}

/// Day count of a remembered trip ("14 day trip").
pub fn trip_days(content: &str) -> Option<u32> {
    first_number(&patterns().days, content)
}

/// Party size of a remembered trip ("for 4 travelers").
pub fn trip_travelers(content: &str) -> Option<u32> {
    first_number(&patterns().travelers, content)
}

/// Appends the values not already present, ignoring case.
pub fn merge_unique(target: &mut Vec<String>, extra: impl IntoIterator<Item = String>) -> usize {
    let mut added = 0;
    for value in extra {
        if !target.iter().any(|v| v.eq_ignore_ascii_case(&value)) {
            target.push(value);
            added += 1;
        }
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_labelled_lists() {
        let text = "Destination research Tokyo. Must visit: Senso-ji Temple; Tokyo Skytree. \
                    Etiquette: bow when greeting; keep quiet on trains. Total estimated cost: 2800.";
        assert_eq!(must_visit(text), vec!["Senso-ji Temple", "Tokyo Skytree"]);
        assert_eq!(etiquette(text), vec!["bow when greeting", "keep quiet on trains"]);
        assert_eq!(total_estimated_cost(text), Some(2800.0));
    }

    #[test]
    fn labels_are_case_insensitive() {
        assert_eq!(verified_activities("VERIFIED ACTIVITIES: Wat Pho."), vec!["Wat Pho"]);
        assert_eq!(total_estimated_cost("nothing here"), None);
    }

    #[test]
    fn names_keep_inner_periods_and_commas() {
        let text = "Destination research Rome. Must visit: St. Peter's Basilica; Trevi Fountain. \
                    Etiquette: cover shoulders, knees in churches; no sitting on monuments. \
                    Total estimated cost: 3000.";
        assert_eq!(must_visit(text), vec!["St. Peter's Basilica", "Trevi Fountain"]);
        assert_eq!(
            etiquette(text),
            vec!["cover shoulders, knees in churches", "no sitting on monuments"]
        );
    }

    #[test]
    fn list_at_end_of_text_without_period() {
        let written = format!("Cultural insights Italy. Etiquette: {}", join_list(&["greet with a kiss", "dress up"]));
        assert_eq!(etiquette(&written), vec!["greet with a kiss", "dress up"]);
    }

    #[test]
    fn empty_lists_are_not_written() {
        assert_eq!(labelled_list::<&str>("Must visit", &[]), None);
        let text = [
            Some("Research data Lisbon.".to_string()),
            labelled_list::<&str>("Verified activities", &[]),
            Some("Booking information: 2 links.".to_string()),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
        assert!(verified_activities(&text).is_empty());
    }

    #[test]
    fn reads_trip_shape() {
        let text = "Budget analysis Lisbon: 14 day trip for 4 travelers at midrange level.";
        assert_eq!(trip_days(text), Some(14));
        assert_eq!(trip_travelers(text), Some(4));
        assert_eq!(trip_travelers("for 1 traveler"), Some(1));
        assert_eq!(trip_days("a day trip"), None);
    }

    #[test]
    fn merge_skips_case_variants() {
        let mut list = vec!["Bow when greeting".to_string()];
        let added = merge_unique(
            &mut list,
            vec!["bow when greeting".to_string(), "tip modestly".to_string()],
        );
        assert_eq!(added, 1);
        assert_eq!(list.len(), 2);
    }
}
