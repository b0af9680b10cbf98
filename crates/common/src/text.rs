//! Text normalisation shared by evidence weighting and lexical scoring

use crate::config::WeightingConfig;
use std::collections::HashSet;

/// English function words, language keywords and diff boilerplate
const DEFAULT_STOP_WORDS: &[&str] = &[
    // English
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has", "have", "in",
    "into", "is", "it", "its", "not", "of", "on", "or", "so", "that", "the", "this", "to", "was",
    "we", "were", "will", "with", "all", "also", "any", "can", "do", "does", "more", "no", "now",
    "only", "our", "out", "some", "such", "than", "then", "there", "these", "they", "up", "use",
    "used", "using", "via", "when", "which", "who", "you", "your",
    // Keywords
    "if", "else", "elif", "for", "while", "do", "switch", "case", "break", "continue", "return",
    "import", "from", "export", "default", "def", "fn", "func", "function", "class", "struct",
    "enum", "impl", "trait", "interface", "type", "let", "const", "var", "mut", "pub", "static",
    "public", "private", "protected", "new", "self", "this", "super", "try", "except", "catch",
    "finally", "throw", "throws", "raise", "async", "await", "yield", "lambda", "pass", "none",
    "nil", "void", "int", "str", "string", "bool", "float", "double", "char", "package", "include",
    "require", "module", "use", "mod", "where", "match", "in", "is", "not", "and", "or", "as",
    "with", "global", "extends", "implements", "instanceof", "typeof", "undefined",
    // Diff / commit boilerplate
    "diff", "index", "null", "true", "false", "todo", "fixme", "fix", "fixed", "update", "updated",
    "add", "added", "remove", "removed", "merge", "branch", "commit", "wip", "file", "files",
    "line", "lines", "readme", "md", "txt", "http", "https", "www", "com", "org", "github",
];

/// Splits text into normalized tokens
#[derive(Debug, Clone)]
pub struct Tokenizer {
    min_len: usize,
    stop_words: HashSet<String>,
}

impl Tokenizer {
    pub fn new(min_len: usize, extra_stop_words: &[String]) -> Self {
        let stop_words = DEFAULT_STOP_WORDS
            .iter()
            .map(|w| w.to_string())
            .chain(extra_stop_words.iter().map(|w| w.trim().to_lowercase()))
            .collect();
        Self {
            min_len: min_len.max(1),
            stop_words,
        }
    }

    pub fn from_config(config: &WeightingConfig) -> Self {
        Self::new(config.min_token_len, &config.extra_stop_words)
    }

    /// Case-fold, split on anything that is not a letter or digit, drop
    /// short, numeric and stop-listed tokens.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|raw| !raw.is_empty())
            .map(|raw| raw.to_lowercase())
            .filter(|token| self.keep(token))
            .collect()
    }

    fn keep(&self, token: &str) -> bool {
        token.chars().count() >= self.min_len
            && !token.chars().all(|c| c.is_ascii_digit())
            && !self.stop_words.contains(token)
    }

    /// Distinct tokens of `text`
    pub fn token_set(&self, text: &str) -> HashSet<String> {
        self.tokenize(text).into_iter().collect()
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(2, &[])
    }
}
