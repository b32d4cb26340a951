//! Transcript-segment text filter, `spec.md` §4.5.1, grounded in
//! `examples/original_source/services/transcription-collector/filters.py`.

use std::collections::HashSet;

use regex::Regex;

use crate::config::FilterConfig;

type CustomPredicate = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Rejects low-value transcript segments before they are promoted to
/// persistent storage: blank audio markers, whisper-style bracket tags,
/// too-short text, and text with too few "real words".
pub struct TranscriptionFilter {
    min_chars: usize,
    min_real_words: usize,
    min_word_chars: usize,
    deny_patterns: Vec<Regex>,
    stopwords: HashSet<String>,
    custom: Vec<CustomPredicate>,
}

impl TranscriptionFilter {
    pub fn from_config(cfg: &FilterConfig) -> Self {
        let deny_patterns = cfg
            .deny_patterns
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();
        Self {
            min_chars: cfg.min_chars,
            min_real_words: cfg.min_real_words,
            min_word_chars: cfg.min_word_chars,
            deny_patterns,
            stopwords: default_stopwords(),
            custom: Vec::new(),
        }
    }

    pub fn with_custom_predicate(mut self, f: CustomPredicate) -> Self {
        self.custom.push(f);
        self
    }

    /// `true` if the segment should be kept.
    pub fn accepts(&self, text: &str) -> bool {
        let trimmed = text.trim();

        if trimmed.chars().count() < self.min_chars {
            return false;
        }

        if self.deny_patterns.iter().any(|re| re.is_match(trimmed)) {
            return false;
        }

        let real_words = trimmed
            .split_whitespace()
            .filter(|w| self.is_real_word(w))
            .count();
        if real_words < self.min_real_words {
            return false;
        }

        self.custom.iter().all(|f| f(trimmed))
    }

    fn is_real_word(&self, word: &str) -> bool {
        if word.chars().count() < self.min_word_chars {
            return false;
        }
        if word.starts_with('<') || word.starts_with('[') {
            return false;
        }
        let lower = word.to_lowercase();
        !self.stopwords.contains(lower.trim_matches(|c: char| !c.is_alphanumeric()))
    }
}

fn default_stopwords() -> HashSet<String> {
    [
        "the", "and", "that", "this", "with", "from", "have", "has", "had", "you", "your",
        "are", "was", "were", "for",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> TranscriptionFilter {
        TranscriptionFilter::from_config(&FilterConfig::default())
    }

    #[test]
    fn accepts_normal_sentence() {
        assert!(filter().accepts("hello world"));
    }

    #[test]
    fn rejects_blank() {
        assert!(!filter().accepts("   "));
    }

    #[test]
    fn rejects_too_short() {
        assert!(!filter().accepts("hi"));
    }

    #[test]
    fn rejects_bracket_tag() {
        assert!(!filter().accepts("[inaudible]"));
    }

    #[test]
    fn rejects_angle_bracket_tag() {
        assert!(!filter().accepts("<silence>"));
    }

    #[test]
    fn rejects_chevrons() {
        assert!(!filter().accepts(">>>"));
    }

    #[test]
    fn min_real_words_enforced() {
        let mut cfg = FilterConfig::default();
        cfg.min_real_words = 2;
        let f = TranscriptionFilter::from_config(&cfg);
        assert!(!f.accepts("the and"));
        assert!(f.accepts("hello world"));
    }

    #[test]
    fn custom_predicate_can_reject() {
        let f = filter().with_custom_predicate(Box::new(|t| !t.contains("banned")));
        assert!(!f.accepts("this text is banned"));
        assert!(f.accepts("this text is fine"));
    }
}
