use std::collections::HashSet;
use std::sync::OnceLock;

use jieba_rs::Jieba;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tokenizer {
    Whitespace,
    Forward,
    Jieba,
}

/// Tokenization knobs applied after the raw split: stop-words and minimum
/// length are enforced here, uniformly across tokenizer kinds.
#[derive(Debug, Clone)]
pub struct TokenizeOptions {
    pub tokenizer: Tokenizer,
    pub min_length: usize,
    pub case_sensitive: bool,
    pub stop_words: HashSet<String>,
    /// Use jieba's HMM-based segmentation (catches words not in its
    /// built-in dictionary) instead of pure dictionary lookup. Only
    /// consulted when `tokenizer == Tokenizer::Jieba`.
    pub use_hmm: bool,
}

impl Default for TokenizeOptions {
    fn default() -> Self {
        Self {
            tokenizer: Tokenizer::Whitespace,
            min_length: 1,
            case_sensitive: false,
            stop_words: HashSet::new(),
            use_hmm: true,
        }
    }
}

/// The jieba dictionary is several megabytes; load it once per process
/// rather than per tokenize call.
fn jieba() -> &'static Jieba {
    static JIEBA: OnceLock<Jieba> = OnceLock::new();
    JIEBA.get_or_init(Jieba::new)
}

/// Split `text` into raw words on Unicode whitespace and punctuation.
fn split_words(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || (c.is_ascii_punctuation() && c != '_'))
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

pub fn tokenize(text: &str, opts: &TokenizeOptions) -> Vec<String> {
    let raw = match opts.tokenizer {
        Tokenizer::Whitespace => split_words(text),
        Tokenizer::Forward => {
            let mut tokens = Vec::new();
            for word in split_words(text) {
                if word.chars().count() >= opts.min_length {
                    let chars: Vec<char> = word.chars().collect();
                    for end in opts.min_length..=chars.len() {
                        tokens.push(chars[..end].iter().collect());
                    }
                } else {
                    tokens.push(word);
                }
            }
            tokens
        }
        Tokenizer::Jieba => jieba().cut(text, opts.use_hmm).into_iter().map(|s| s.to_string()).collect(),
    };

    raw.into_iter()
        .map(|t| if opts.case_sensitive { t } else { t.to_lowercase() })
        .filter(|t| t.chars().count() >= opts.min_length)
        .filter(|t| !opts.stop_words.contains(t))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_lowercases_and_splits_punctuation() {
        let opts = TokenizeOptions::default();
        let tokens = tokenize("Clark Kent, reporter.", &opts);
        assert_eq!(tokens, vec!["clark", "kent", "reporter"]);
    }

    #[test]
    fn forward_emits_every_prefix_at_least_min_length() {
        let opts = TokenizeOptions { tokenizer: Tokenizer::Forward, min_length: 3, ..Default::default() };
        let tokens = tokenize("clark", &opts);
        assert_eq!(tokens, vec!["cla", "clar", "clark"]);
    }

    #[test]
    fn stop_words_are_dropped() {
        let mut stop_words = HashSet::new();
        stop_words.insert("the".to_string());
        let opts = TokenizeOptions { stop_words, ..Default::default() };
        let tokens = tokenize("the daily planet", &opts);
        assert_eq!(tokens, vec!["daily", "planet"]);
    }

    #[test]
    fn min_length_drops_short_tokens() {
        let opts = TokenizeOptions { min_length: 3, ..Default::default() };
        let tokens = tokenize("a cat sat", &opts);
        assert_eq!(tokens, vec!["cat", "sat"]);
    }

    #[test]
    fn jieba_segments_cjk_text() {
        let opts = TokenizeOptions { tokenizer: Tokenizer::Jieba, ..Default::default() };
        let tokens = tokenize("我来自北京", &opts);
        assert!(!tokens.is_empty());
    }

    #[test]
    fn jieba_without_hmm_still_segments() {
        let opts = TokenizeOptions { tokenizer: Tokenizer::Jieba, use_hmm: false, ..Default::default() };
        let tokens = tokenize("我来自北京", &opts);
        assert!(!tokens.is_empty());
    }
}
