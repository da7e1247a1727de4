//! Sentence-boundary chunking
//!
//! Records whose content exceeds `max_chunk_size` characters are split into
//! fragments on terminal punctuation (`.`, `!`, `?`). Sentences are packed
//! greedily and never split; a single sentence longer than the limit becomes
//! an oversized fragment of its own.

use super::record::{Fragment, MemoryRecord};

#[derive(Debug, Clone)]
pub struct Chunker {
    max_chunk_size: usize,
}

impl Chunker {
    pub fn new(max_chunk_size: usize) -> Self {
        Self {
            max_chunk_size: max_chunk_size.max(1),
        }
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    /// Splits `record` into fragments tagged with `chunk_index`/`chunk_count`.
    ///
    /// Content within the limit is returned as a single untagged fragment
    /// carrying the record's own id.
    pub fn chunk(&self, record: MemoryRecord) -> Vec<Fragment> {
        if char_len(&record.content) <= self.max_chunk_size {
            return vec![Fragment::from(record)];
        }

        let pieces = pack_sentences(&record.content, self.max_chunk_size);
        if pieces.is_empty() {
            return vec![Fragment::from(record)];
        }

        let mut fragments: Vec<Fragment> = pieces
            .into_iter()
            .enumerate()
            .map(|(index, content)| {
                let mut metadata = record.metadata.clone();
                metadata.chunk_index = Some(index);
                Fragment {
                    id: format!("{}_chunk_{}", record.id, index),
                    kind: record.kind,
                    content,
                    metadata,
                }
            })
            .collect();

        let total = fragments.len();
        for fragment in &mut fragments {
            fragment.metadata.chunk_count = Some(total);
        }
        fragments
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// Splits text after each run of terminal punctuation, trimming whitespace.
pub(crate) fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !is_terminal(c) {
            continue;
        }
        let next_is_terminal = chars.peek().map(|&(_, n)| is_terminal(n)).unwrap_or(false);
        if next_is_terminal {
            continue;
        }
        let end = i + c.len_utf8();
        let sentence = text[start..end].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = end;
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

fn pack_sentences(text: &str, max: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut buffer = String::new();
    let mut buffer_len = 0;

    for sentence in split_sentences(text) {
        let len = char_len(sentence);
        if !buffer.is_empty() && buffer_len + 1 + len > max {
            pieces.push(std::mem::take(&mut buffer));
            buffer_len = 0;
        }
        if !buffer.is_empty() {
            buffer.push(' ');
            buffer_len += 1;
        }
        buffer.push_str(sentence);
        buffer_len += len;
    }

    if !buffer.is_empty() {
        pieces.push(buffer);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::record::{MemoryKind, Metadata};
    use chrono::Utc;

    fn record(content: &str) -> MemoryRecord {
        MemoryRecord::new(
            "rec",
            MemoryKind::Research,
            content,
            Metadata::new("test", Utc::now()).with_destination("Paris"),
        )
    }

    #[test]
    fn short_record_is_untouched() {
        let rec = record("Short note.");
        let fragments = Chunker::new(100).chunk(rec.clone());
        assert_eq!(fragments, vec![Fragment::from(rec)]);
        assert!(fragments[0].metadata.chunk_index.is_none());
    }

    #[test]
    fn splits_on_sentence_boundaries() {
        let fragments =
            Chunker::new(20).chunk(record("First one here. Second one! Third? Fourth sentence."));

        let contents: Vec<&str> = fragments.iter().map(|f| f.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["First one here.", "Second one! Third?", "Fourth sentence."]
        );
        for (i, f) in fragments.iter().enumerate() {
            assert_eq!(f.id, format!("rec_chunk_{}", i));
            assert_eq!(f.metadata.chunk_index, Some(i));
            assert_eq!(f.metadata.chunk_count, Some(3));
            assert_eq!(f.metadata.destination.as_deref(), Some("Paris"));
        }
    }

    #[test]
    fn oversized_sentence_is_kept_whole() {
        let long = "This sentence is much longer than the configured limit allows.";
        let fragments = Chunker::new(10).chunk(record(&format!("Hi. {} Bye.", long)));

        assert_eq!(fragments.len(), 3);
        assert_eq!(fragments[1].content, long);
    }

    #[test]
    fn punctuation_runs_stay_together() {
        assert_eq!(
            split_sentences("Really?! Yes... fine"),
            vec!["Really?!", "Yes...", "fine"]
        );
    }
}
