//! Search quality evaluation
//!
//! Runs every ground-truth question through a strategy and reports hit rate
//! (share of questions whose source document was retrieved at all) and mean
//! reciprocal rank. A match is relevant when its course and question equal the
//! ground truth's.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::{RagError, Result};
use crate::rag::retrieval::{Query, RetrievalResult, RetrievalStrategy, StrategyKind};

/// A question paired with the document that answers it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundTruth {
    pub question: String,
    pub course: String,
    /// FAQ question of the relevant document
    pub document_question: String,
}

impl GroundTruth {
    /// 1-based rank of the relevant document, if retrieved
    pub fn relevant_rank(&self, result: &RetrievalResult) -> Option<usize> {
        result
            .iter()
            .find(|m| m.document.course == self.course && m.document.question == self.document_question)
            .map(|m| m.rank)
    }
}

/// Load ground truth from a JSON array file
pub fn load_ground_truth(path: &Path) -> Result<Vec<GroundTruth>> {
    let source = path.display().to_string();
    let body = std::fs::read_to_string(path)
        .map_err(|e| RagError::source_unavailable(&source, e))?;
    serde_json::from_str(&body).map_err(|e| RagError::malformed(&source, e))
}

/// Aggregate retrieval quality
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub strategy: StrategyKind,
    pub queries: usize,
    pub hit_rate: f64,
    pub mrr: f64,
}

/// Hit rate and MRR from per-query relevant ranks
pub fn score(strategy: StrategyKind, ranks: &[Option<usize>]) -> EvaluationReport {
    let queries = ranks.len();
    if queries == 0 {
        return EvaluationReport {
            strategy,
            queries,
            hit_rate: 0.0,
            mrr: 0.0,
        };
    }

    let hits = ranks.iter().filter(|r| r.is_some()).count();
    let reciprocal: f64 = ranks.iter().flatten().map(|r| 1.0 / *r as f64).sum();

    EvaluationReport {
        strategy,
        queries,
        hit_rate: hits as f64 / queries as f64,
        mrr: reciprocal / queries as f64,
    }
}

/// Evaluate a strategy over a ground-truth set, `limit` results per query
pub async fn evaluate(
    strategy: &dyn RetrievalStrategy,
    ground_truth: &[GroundTruth],
    limit: usize,
) -> Result<EvaluationReport> {
    let mut ranks = Vec::with_capacity(ground_truth.len());

    for truth in ground_truth {
        let query = Query::new(truth.question.clone(), limit).for_course(truth.course.clone());
        let result = strategy.search(&query).await?;
        ranks.push(truth.relevant_rank(&result));
    }

    let report = score(strategy.kind(), &ranks);
    tracing::info!(
        strategy = %report.strategy,
        queries = report.queries,
        hit_rate = report.hit_rate,
        mrr = report.mrr,
        "Evaluation finished"
    );
    Ok(report)
}
