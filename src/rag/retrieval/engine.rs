// Retrieval engine: a strategy plus default search parameters
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::errors::Result;
use crate::rag::retrieval::strategies::RetrievalStrategy;
use crate::rag::retrieval::types::{Query, RetrievalResult, StrategyKind};

/// Search parameters for retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    /// Maximum number of results to retrieve
    pub limit: usize,
    /// Restrict to one course (None = all courses)
    pub course: Option<String>,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            limit: 5,
            course: None,
        }
    }
}

impl SearchParams {
    fn query(&self, text: &str) -> Query {
        let query = Query::new(text, self.limit);
        match &self.course {
            Some(course) => query.for_course(course.clone()),
            None => query,
        }
    }
}

/// Retrieval engine over one strategy
pub struct RetrievalEngine {
    strategy: Arc<dyn RetrievalStrategy>,
    default_params: SearchParams,
}

impl RetrievalEngine {
    /// Create new retrieval engine
    pub fn new(strategy: Arc<dyn RetrievalStrategy>) -> Self {
        Self {
            strategy,
            default_params: SearchParams::default(),
        }
    }

    /// Create with custom default parameters
    pub fn with_params(strategy: Arc<dyn RetrievalStrategy>, params: SearchParams) -> Self {
        Self {
            strategy,
            default_params: params,
        }
    }

    /// Retrieve documents matching query
    pub async fn retrieve(&self, query: &str) -> Result<RetrievalResult> {
        self.retrieve_with_params(query, &self.default_params).await
    }

    /// Retrieve with custom parameters
    pub async fn retrieve_with_params(
        &self,
        query: &str,
        params: &SearchParams,
    ) -> Result<RetrievalResult> {
        let result = self.strategy.search(&params.query(query)).await?;

        tracing::info!(
            strategy = %result.strategy,
            course = params.course.as_deref().unwrap_or("*"),
            matches = result.len(),
            "Retrieved documents"
        );

        Ok(result)
    }

    pub fn strategy(&self) -> StrategyKind {
        self.strategy.kind()
    }

    /// Get default search parameters
    pub fn default_params(&self) -> &SearchParams {
        &self.default_params
    }

    /// Update default search parameters
    pub fn set_default_params(&mut self, params: SearchParams) {
        self.default_params = params;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::retrieval::types::ScoredMatch;
    use crate::Document;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct EchoStrategy {
        seen: Mutex<Vec<Query>>,
    }

    #[async_trait]
    impl RetrievalStrategy for EchoStrategy {
        async fn search(&self, query: &Query) -> Result<RetrievalResult> {
            self.seen.lock().unwrap().push(query.clone());
            Ok(RetrievalResult {
                strategy: StrategyKind::Sparse,
                matches: vec![ScoredMatch {
                    document: Document {
                        course: "llm-zoomcamp".to_string(),
                        section: "General".to_string(),
                        question: "q".to_string(),
                        text: query.text.clone(),
                    },
                    score: 1.0,
                    rank: 1,
                }],
            })
        }

        fn kind(&self) -> StrategyKind {
            StrategyKind::Sparse
        }
    }

    #[test]
    fn test_search_params_default() {
        let params = SearchParams::default();
        assert_eq!(params.limit, 5);
        assert!(params.course.is_none());
    }

    #[tokio::test]
    async fn test_retrieve_applies_default_params() {
        let strategy = Arc::new(EchoStrategy {
            seen: Mutex::new(Vec::new()),
        });
        let engine = RetrievalEngine::with_params(
            strategy.clone(),
            SearchParams {
                limit: 3,
                course: Some("llm-zoomcamp".to_string()),
            },
        );

        let result = engine.retrieve("How do I join?").await.unwrap();
        assert_eq!(result.matches[0].document.text, "How do I join?");
        assert_eq!(engine.strategy(), StrategyKind::Sparse);

        let seen = strategy.seen.lock().unwrap();
        assert_eq!(seen[0].limit, 3);
        assert_eq!(seen[0].filter.as_ref().unwrap().value, "llm-zoomcamp");
    }

    #[tokio::test]
    async fn test_retrieve_with_params_overrides_defaults() {
        let strategy = Arc::new(EchoStrategy {
            seen: Mutex::new(Vec::new()),
        });
        let mut engine = RetrievalEngine::new(strategy.clone());
        engine.set_default_params(SearchParams {
            limit: 9,
            course: None,
        });
        assert_eq!(engine.default_params().limit, 9);

        engine
            .retrieve_with_params("q", &SearchParams { limit: 2, course: None })
            .await
            .unwrap();
        let seen = strategy.seen.lock().unwrap();
        assert_eq!(seen[0].limit, 2);
        assert!(seen[0].filter.is_none());
    }
}
