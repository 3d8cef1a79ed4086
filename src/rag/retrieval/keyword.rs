//! Field-boosted keyword search over loaded documents
//!
//! An in-process TF-IDF index with one vector space per text field
//! (`question`, `text`, `section`). A document's score is the boost-weighted
//! sum of its per-field cosine similarities to the query. Payload filters are
//! exact matches on document fields. Nothing goes through the search store.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::documents::Document;
use crate::errors::Result;
use crate::rag::retrieval::strategies::RetrievalStrategy;
use crate::rag::retrieval::types::{Query, RetrievalResult, ScoredMatch, StrategyKind};
use crate::store::FieldFilter;

/// Per-field weights; the question field dominates, section barely counts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldBoosts {
    pub question: f32,
    pub text: f32,
    pub section: f32,
}

impl Default for FieldBoosts {
    fn default() -> Self {
        Self {
            question: 3.0,
            text: 1.0,
            section: 0.3,
        }
    }
}

type SparseVector = HashMap<String, f32>;

/// TF-IDF vectors of one text field, L2 normalised
#[derive(Debug, Clone, Default)]
struct FieldIndex {
    idf: HashMap<String, f32>,
    vectors: Vec<SparseVector>,
}

impl FieldIndex {
    fn fit<'a>(texts: impl Iterator<Item = &'a str>) -> Self {
        let tokenized: Vec<Vec<String>> = texts.map(terms).collect();
        let n = tokenized.len() as f32;

        let mut df: HashMap<String, usize> = HashMap::new();
        for tokens in &tokenized {
            let unique: HashSet<&String> = tokens.iter().collect();
            for term in unique {
                *df.entry(term.clone()).or_insert(0) += 1;
            }
        }

        // smoothed idf: ln((1 + n) / (1 + df)) + 1
        let idf: HashMap<String, f32> = df
            .into_iter()
            .map(|(term, count)| (term, ((1.0 + n) / (1.0 + count as f32)).ln() + 1.0))
            .collect();

        let mut index = Self {
            idf,
            vectors: Vec::with_capacity(tokenized.len()),
        };
        index.vectors = tokenized.iter().map(|t| index.weigh(t)).collect();
        index
    }

    /// Term counts times idf; unknown terms are dropped
    fn weigh(&self, tokens: &[String]) -> SparseVector {
        let mut vector = SparseVector::new();
        for token in tokens {
            if let Some(idf) = self.idf.get(token) {
                *vector.entry(token.clone()).or_insert(0.0) += idf;
            }
        }

        let norm = vector.values().map(|w| w * w).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.values_mut().for_each(|w| *w /= norm);
        }
        vector
    }

    fn similarity(&self, query: &SparseVector, idx: usize) -> f32 {
        let doc = &self.vectors[idx];
        query
            .iter()
            .filter_map(|(term, w)| doc.get(term).map(|d| w * d))
            .sum()
    }
}

/// Keyword strategy fitted from a document set
#[derive(Debug, Clone)]
pub struct KeywordRetrieval {
    documents: Vec<Document>,
    question: FieldIndex,
    text: FieldIndex,
    section: FieldIndex,
    boosts: FieldBoosts,
}

impl KeywordRetrieval {
    pub fn fit(documents: Vec<Document>, boosts: FieldBoosts) -> Self {
        let question = FieldIndex::fit(documents.iter().map(|d| d.question.as_str()));
        let text = FieldIndex::fit(documents.iter().map(|d| d.text.as_str()));
        let section = FieldIndex::fit(documents.iter().map(|d| d.section.as_str()));

        tracing::debug!(documents = documents.len(), "Fitted keyword index");

        Self {
            documents,
            question,
            text,
            section,
            boosts,
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn boosts(&self) -> FieldBoosts {
        self.boosts
    }

    fn score(&self, query: &str) -> Vec<(usize, f32)> {
        let tokens = terms(query);
        let q_question = self.question.weigh(&tokens);
        let q_text = self.text.weigh(&tokens);
        let q_section = self.section.weigh(&tokens);

        (0..self.documents.len())
            .map(|idx| {
                let score = self.boosts.question * self.question.similarity(&q_question, idx)
                    + self.boosts.text * self.text.similarity(&q_text, idx)
                    + self.boosts.section * self.section.similarity(&q_section, idx);
                (idx, score)
            })
            .collect()
    }
}

#[async_trait]
impl RetrievalStrategy for KeywordRetrieval {
    async fn search(&self, query: &Query) -> Result<RetrievalResult> {
        query.validate()?;

        let mut hits: Vec<(usize, f32)> = self
            .score(&query.text)
            .into_iter()
            .filter(|(idx, score)| {
                *score > 0.0
                    && query
                        .filter
                        .as_ref()
                        .map(|f| field_matches(&self.documents[*idx], f))
                        .unwrap_or(true)
            })
            .collect();

        // stable: ties keep document order
        hits.sort_by(|a, b| b.1.total_cmp(&a.1));
        hits.truncate(query.limit);

        let matches = hits
            .into_iter()
            .enumerate()
            .map(|(pos, (idx, score))| ScoredMatch {
                document: self.documents[idx].clone(),
                score,
                rank: pos + 1,
            })
            .collect();

        Ok(RetrievalResult {
            strategy: StrategyKind::Keyword,
            matches,
        })
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Keyword
    }
}

fn field_matches(document: &Document, filter: &FieldFilter) -> bool {
    let value = match filter.key.as_str() {
        "course" => &document.course,
        "section" => &document.section,
        "question" => &document.question,
        "text" => &document.text,
        _ => return false,
    };
    *value == filter.value
}

/// Lowercased alphanumeric tokens without English stop words
fn terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .filter(|t| !is_stop_word(t))
        .collect()
}

fn is_stop_word(word: &str) -> bool {
    matches!(
        word,
        "a" | "an"
            | "and"
            | "are"
            | "as"
            | "at"
            | "be"
            | "but"
            | "by"
            | "can"
            | "do"
            | "does"
            | "for"
            | "from"
            | "has"
            | "have"
            | "how"
            | "i"
            | "if"
            | "in"
            | "is"
            | "it"
            | "its"
            | "my"
            | "not"
            | "of"
            | "on"
            | "or"
            | "so"
            | "that"
            | "the"
            | "this"
            | "to"
            | "was"
            | "we"
            | "what"
            | "when"
            | "which"
            | "will"
            | "with"
            | "you"
    )
}
