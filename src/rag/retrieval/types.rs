// Query and result types shared by every retrieval strategy
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::documents::Document;
use crate::errors::{RagError, Result};
use crate::store::{FieldFilter, ScoredPoint};

/// Which retrieval strategy to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Dense embedding similarity
    Dense,
    /// BM25 sparse similarity
    Sparse,
    /// Dense prefetch narrowed by a sparse rerank
    PrefetchRerank,
    /// Dense and sparse prefetch merged with reciprocal rank fusion
    Fused,
    /// Field-boosted TF-IDF over loaded documents, no store involved
    Keyword,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Dense => "dense",
            StrategyKind::Sparse => "sparse",
            StrategyKind::PrefetchRerank => "prefetch-rerank",
            StrategyKind::Fused => "fused",
            StrategyKind::Keyword => "keyword",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "dense" => Ok(StrategyKind::Dense),
            "sparse" => Ok(StrategyKind::Sparse),
            "prefetch-rerank" | "prefetch_rerank" | "two-stage" => Ok(StrategyKind::PrefetchRerank),
            "fused" | "rrf" | "hybrid" => Ok(StrategyKind::Fused),
            "keyword" | "boosted" | "tfidf" => Ok(StrategyKind::Keyword),
            other => Err(RagError::Config(format!("Unknown retrieval strategy: {}", other))),
        }
    }
}

/// A free-text query with optional payload filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    pub filter: Option<FieldFilter>,
    pub limit: usize,
}

impl Query {
    pub fn new(text: impl Into<String>, limit: usize) -> Self {
        Self {
            text: text.into(),
            filter: None,
            limit,
        }
    }

    /// Restrict results to one course
    pub fn for_course(mut self, course: impl Into<String>) -> Self {
        self.filter = Some(FieldFilter::new("course", course));
        self
    }

    pub fn with_filter(mut self, filter: Option<FieldFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(RagError::InvalidQuery("limit must be at least 1".to_string()));
        }
        if self.text.trim().is_empty() {
            return Err(RagError::InvalidQuery("query text is empty".to_string()));
        }
        Ok(())
    }
}

/// One retrieved document with its score and 1-based rank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredMatch {
    pub document: Document,
    pub score: f32,
    pub rank: usize,
}

/// Matches ordered by descending score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub strategy: StrategyKind,
    pub matches: Vec<ScoredMatch>,
}

impl RetrievalResult {
    pub fn empty(strategy: StrategyKind) -> Self {
        Self {
            strategy,
            matches: Vec::new(),
        }
    }

    /// Build from store hits: sorts by score, stamps ranks, truncates to `limit`
    pub fn from_points(
        strategy: StrategyKind,
        collection: &str,
        points: Vec<ScoredPoint>,
        limit: usize,
    ) -> Result<Self> {
        let mut matches = points
            .into_iter()
            .map(|point| {
                let document: Document =
                    serde_json::from_value(serde_json::Value::Object(point.payload))
                        .map_err(|e| RagError::malformed(collection, e))?;
                Ok(ScoredMatch {
                    document,
                    score: point.score,
                    rank: 0,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(limit);
        for (idx, m) in matches.iter_mut().enumerate() {
            m.rank = idx + 1;
        }

        Ok(Self { strategy, matches })
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScoredMatch> {
        self.matches.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PointId;
    use serde_json::json;

    fn point(id: u64, score: f32, section: &str) -> ScoredPoint {
        ScoredPoint {
            id: PointId::Num(id),
            score,
            payload: json!({
                "course": "llm-zoomcamp",
                "section": section,
                "question": "q",
                "text": "t",
            })
            .as_object()
            .unwrap()
            .clone(),
        }
    }

    #[test]
    fn test_strategy_kind_parse() {
        assert_eq!("dense".parse::<StrategyKind>().unwrap(), StrategyKind::Dense);
        assert_eq!("RRF".parse::<StrategyKind>().unwrap(), StrategyKind::Fused);
        assert_eq!(
            "two-stage".parse::<StrategyKind>().unwrap(),
            StrategyKind::PrefetchRerank
        );
        assert_eq!("keyword".parse::<StrategyKind>().unwrap(), StrategyKind::Keyword);
        assert!("semantic".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn test_query_validation() {
        assert!(Query::new("When can I start?", 5).validate().is_ok());
        assert!(matches!(
            Query::new("When can I start?", 0).validate(),
            Err(RagError::InvalidQuery(_))
        ));
        assert!(Query::new("   ", 5).validate().is_err());
    }

    #[test]
    fn test_for_course_sets_filter() {
        let query = Query::new("q", 5).for_course("mlops-zoomcamp");
        let filter = query.filter.unwrap();
        assert_eq!(filter.key, "course");
        assert_eq!(filter.value, "mlops-zoomcamp");
    }

    #[test]
    fn test_from_points_sorts_and_ranks() {
        let result = RetrievalResult::from_points(
            StrategyKind::Dense,
            "faq",
            vec![point(1, 0.2, "b"), point(2, 0.9, "a"), point(3, 0.5, "c")],
            2,
        )
        .unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result.matches[0].document.section, "a");
        assert_eq!(result.matches[0].rank, 1);
        assert_eq!(result.matches[1].document.section, "c");
        assert_eq!(result.matches[1].rank, 2);
    }

    #[test]
    fn test_from_points_rejects_bad_payload() {
        let bad = ScoredPoint {
            id: PointId::Num(1),
            score: 1.0,
            payload: json!({"course": "x"}).as_object().unwrap().clone(),
        };
        let err = RetrievalResult::from_points(StrategyKind::Sparse, "faq", vec![bad], 5).unwrap_err();
        assert!(matches!(err, RagError::MalformedData { .. }));
    }
}
