//! Evidence weighting
//!
//! Edge weights for the HIN:
//! - repository contribution weight `1 + ln(commit_count)`
//! - TF-IDF of a skill's canonical terms in a commit's changed text
//! - commit "richness" from the total TF-IDF mass of its corpus
//!
//! The document collection is scoped to one inference run.

use crate::records::CommitRecord;
use skillgraph_common::config::WeightingConfig;
use std::collections::{BTreeMap, HashMap};

pub use skillgraph_common::text::Tokenizer;

/// Added lines of a unified diff, without the `+` marker
pub fn preprocess_patch(patch: &str) -> String {
    patch
        .lines()
        .filter(|line| line.starts_with('+') && !line.starts_with("+++"))
        .map(|line| &line[1..])
        .collect::<Vec<_>>()
        .join("\n")
}

/// Changed-text corpus of one commit: message, added lines and extracted terms
pub fn commit_corpus(commit: &CommitRecord) -> String {
    let mut corpus = commit.message.clone();
    for file in &commit.files {
        if let Some(patch) = &file.patch {
            corpus.push('\n');
            corpus.push_str(&preprocess_patch(patch));
        }
    }
    for term in &commit.terms {
        corpus.push('\n');
        corpus.push_str(term);
    }
    corpus
}

/// Term counts of each document plus document frequencies
#[derive(Debug, Clone, Default)]
pub struct DocumentCollection {
    /// Ordered counts keep float sums reproducible
    documents: HashMap<String, BTreeMap<String, u32>>,
    doc_freq: HashMap<String, usize>,
}

impl DocumentCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one tokenized document. A document id seen before is ignored.
    pub fn add_document(&mut self, id: &str, tokens: &[String]) -> bool {
        if self.documents.contains_key(id) {
            return false;
        }

        let mut counts: BTreeMap<String, u32> = BTreeMap::new();
        for token in tokens {
            *counts.entry(token.clone()).or_insert(0) += 1;
        }
        for token in counts.keys() {
            *self.doc_freq.entry(token.clone()).or_insert(0) += 1;
        }
        self.documents.insert(id.to_string(), counts);
        true
    }

    /// Number of documents
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.documents.contains_key(id)
    }

    /// Raw count of `token` in document `id`
    pub fn tf(&self, id: &str, token: &str) -> u32 {
        self.documents
            .get(id)
            .and_then(|counts| counts.get(token))
            .copied()
            .unwrap_or(0)
    }

    /// `ln(N / df)`, 0 for tokens no document contains
    pub fn idf(&self, token: &str) -> f64 {
        match self.doc_freq.get(token) {
            Some(&df) if df > 0 => (self.len() as f64 / df as f64).ln(),
            _ => 0.0,
        }
    }

    pub fn tfidf(&self, id: &str, token: &str) -> f64 {
        let tf = self.tf(id, token);
        if tf == 0 {
            return 0.0;
        }
        tf as f64 * self.idf(token)
    }

    /// Score of a (possibly multi-token) term: sum over its tokens
    pub fn term_score(&self, id: &str, term_tokens: &[String]) -> f64 {
        term_tokens.iter().map(|t| self.tfidf(id, t)).sum()
    }

    /// Total TF-IDF mass of a document
    pub fn total_score(&self, id: &str) -> f64 {
        match self.documents.get(id) {
            Some(counts) => counts
                .iter()
                .map(|(token, &tf)| tf as f64 * self.idf(token))
                .sum(),
            None => 0.0,
        }
    }
}

/// `1 + ln(commit_count)`; no edge for zero commits
pub fn repository_weight(commit_count: usize) -> Option<f64> {
    if commit_count == 0 {
        None
    } else {
        Some(1.0 + (commit_count as f64).ln())
    }
}

/// Semantic richness of a commit, squashed into [0.01, 1]
pub fn commit_richness(total_tfidf: f64) -> f64 {
    total_tfidf.max(0.0).ln_1p().clamp(0.01, 1.0)
}

/// Tokenizer plus linking threshold
#[derive(Debug, Clone)]
pub struct EvidenceWeighter {
    tokenizer: Tokenizer,
    min_skill_weight: f64,
}

impl EvidenceWeighter {
    pub fn new(tokenizer: Tokenizer, min_skill_weight: f64) -> Self {
        Self {
            tokenizer,
            min_skill_weight,
        }
    }

    pub fn from_config(config: &WeightingConfig) -> Self {
        Self::new(Tokenizer::from_config(config), config.min_skill_weight)
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Tokenize a canonical skill term exactly like document text
    pub fn term_tokens(&self, term: &str) -> Vec<String> {
        let tokens = self.tokenizer.tokenize(term);
        if tokens.is_empty() {
            tracing::debug!(term = term, "Skill term has no scorable tokens");
        }
        tokens
    }

    /// Fit a collection over the corpora of the given commits
    pub fn fit<'a, I>(&self, commits: I) -> DocumentCollection
    where
        I: IntoIterator<Item = &'a CommitRecord>,
    {
        let mut collection = DocumentCollection::new();
        for commit in commits {
            let tokens = self.tokenizer.tokenize(&commit_corpus(commit));
            collection.add_document(commit.sha.trim(), &tokens);
        }
        collection
    }

    /// Commit -> skill weight: best score over the skill's terms, `None`
    /// below the linking threshold.
    pub fn skill_weight(
        &self,
        collection: &DocumentCollection,
        doc_id: &str,
        terms: &[Vec<String>],
    ) -> Option<f64> {
        let best = terms
            .iter()
            .filter(|tokens| !tokens.is_empty())
            .map(|tokens| collection.term_score(doc_id, tokens))
            .fold(0.0_f64, f64::max);

        if best > 0.0 && best >= self.min_skill_weight {
            Some(best)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::FileChange;

    fn tokens(words: &str) -> Vec<String> {
        words.split_whitespace().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_preprocess_patch_keeps_added_lines() {
        let patch = "--- a/model.py\n+++ b/model.py\n@@ -1,2 +1,3 @@\n-import old\n+import transformers\n context\n+model = load()";
        assert_eq!(preprocess_patch(patch), "import transformers\nmodel = load()");
    }

    #[test]
    fn test_commit_corpus_combines_sources() {
        let commit = CommitRecord {
            sha: "abc".into(),
            message: "Train model".into(),
            files: vec![FileChange {
                filename: "train.py".into(),
                patch: Some("+from transformers import Trainer\n-removed".into()),
                ..Default::default()
            }],
            terms: vec!["huggingface".into()],
            ..Default::default()
        };
        let corpus = commit_corpus(&commit);
        assert!(corpus.contains("Trainer"));
        assert!(corpus.contains("huggingface"));
        assert!(!corpus.contains("removed"));
    }

    #[test]
    fn test_token_in_every_document_scores_zero() {
        let mut collection = DocumentCollection::new();
        collection.add_document("a", &tokens("boilerplate tokio"));
        collection.add_document("b", &tokens("boilerplate serde"));
        collection.add_document("c", &tokens("boilerplate boilerplate"));

        assert_eq!(collection.idf("boilerplate"), 0.0);
        assert_eq!(collection.tfidf("c", "boilerplate"), 0.0);
        assert!(collection.tfidf("a", "tokio") > 0.0);
    }

    #[test]
    fn test_idf_matches_reference_values() {
        let mut collection = DocumentCollection::new();
        for i in 0..40 {
            let words = if i < 10 { "transformers model" } else { "model" };
            collection.add_document(&format!("c{}", i), &tokens(words));
        }
        assert!((collection.idf("transformers") - 4.0_f64.ln()).abs() < 1e-12);
        assert!((collection.idf("transformers") - 1.386).abs() < 1e-3);
        assert_eq!(collection.tfidf("c20", "transformers"), 0.0);
        assert_eq!(collection.idf("unknown"), 0.0);
    }

    #[test]
    fn test_duplicate_document_ignored() {
        let mut collection = DocumentCollection::new();
        assert!(collection.add_document("a", &tokens("rust")));
        assert!(!collection.add_document("a", &tokens("rust rust")));
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.tf("a", "rust"), 1);
    }

    #[test]
    fn test_repository_weight() {
        assert_eq!(repository_weight(0), None);
        assert_eq!(repository_weight(1), Some(1.0));
        let w = repository_weight(40).unwrap();
        assert!((w - (1.0 + 40.0_f64.ln())).abs() < 1e-12);
        assert!((w - 4.69).abs() < 0.01);
    }

    #[test]
    fn test_commit_richness_bounds() {
        assert_eq!(commit_richness(0.0), 0.01);
        assert_eq!(commit_richness(100.0), 1.0);
        let mid = commit_richness(0.5);
        assert!(mid > 0.01 && mid < 1.0);
    }

    #[test]
    fn test_skill_weight_threshold_and_multi_token_terms() {
        let weighter = EvidenceWeighter::new(Tokenizer::default(), 0.05);
        let mut collection = DocumentCollection::new();
        collection.add_document("a", &tokens("machine learning pipeline"));
        collection.add_document("b", &tokens("pipeline"));

        let terms = vec![weighter.term_tokens("machine learning"), weighter.term_tokens("sklearn")];
        let w = weighter.skill_weight(&collection, "a", &terms).unwrap();
        assert!((w - 2.0 * 2.0_f64.ln()).abs() < 1e-12);
        assert_eq!(weighter.skill_weight(&collection, "b", &terms), None);

        let strict = EvidenceWeighter::new(Tokenizer::default(), 10.0);
        assert_eq!(strict.skill_weight(&collection, "a", &terms), None);
    }
}
