// Retrieval strategies over a search store
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::errors::{RagError, Result};
use crate::rag::retrieval::types::{Query, RetrievalResult, StrategyKind};
use crate::store::{QueryPlan, QueryStage, SearchStore, StoreQuery, TextInput};

/// Over-fetch factor for prefetch stages
pub const PREFETCH_MULTIPLIER: usize = 5;

/// Collection and vector names a strategy queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub strategy: StrategyKind,
    pub collection: String,
    /// Dense vector name; `None` = unnamed default vector
    pub dense_vector: Option<String>,
    pub dense_model: String,
    pub sparse_vector: String,
    pub sparse_model: String,
    /// Default result count
    pub limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Fused,
            collection: "zoomcamp-rag".to_string(),
            dense_vector: Some("jina-small".to_string()),
            dense_model: "jinaai/jina-embeddings-v2-small-en".to_string(),
            sparse_vector: "bm25".to_string(),
            sparse_model: "Qdrant/bm25".to_string(),
            limit: 5,
        }
    }
}

/// Candidate pool for a two-stage query; saturates for huge limits
fn prefetch_pool(limit: usize) -> usize {
    limit.saturating_mul(PREFETCH_MULTIPLIER)
}

impl RetrievalConfig {
    fn dense_stage(&self, query: &Query, limit: usize) -> QueryStage {
        QueryStage {
            input: TextInput::new(query.text.clone(), self.dense_model.clone()),
            using: self.dense_vector.clone(),
            filter: query.filter.clone(),
            limit: limit as u64,
        }
    }

    fn sparse_stage(&self, query: &Query, limit: usize) -> QueryStage {
        QueryStage {
            input: TextInput::new(query.text.clone(), self.sparse_model.clone()),
            using: Some(self.sparse_vector.clone()),
            filter: query.filter.clone(),
            limit: limit as u64,
        }
    }
}

/// Common contract of all retrieval strategies
#[async_trait]
pub trait RetrievalStrategy: Send + Sync {
    /// Ranked matches for the query, at most `query.limit`
    async fn search(&self, query: &Query) -> Result<RetrievalResult>;

    fn kind(&self) -> StrategyKind;
}

/// Shared plumbing: validate, send the plan, normalise the hits
async fn run_plan(
    store: &dyn SearchStore,
    config: &RetrievalConfig,
    kind: StrategyKind,
    query: &Query,
    plan: QueryPlan,
) -> Result<RetrievalResult> {
    let store_query = StoreQuery {
        collection: config.collection.clone(),
        plan,
    };

    let points = store.query(&store_query).await?;
    tracing::debug!(
        strategy = %kind,
        collection = %config.collection,
        hits = points.len(),
        "Store query finished"
    );

    RetrievalResult::from_points(kind, &config.collection, points, query.limit)
}

/// Nearest neighbours by dense embedding similarity
pub struct DenseRetrieval {
    store: Arc<dyn SearchStore>,
    config: RetrievalConfig,
}

impl DenseRetrieval {
    pub fn new(store: Arc<dyn SearchStore>, config: RetrievalConfig) -> Self {
        Self { store, config }
    }
}

#[async_trait]
impl RetrievalStrategy for DenseRetrieval {
    async fn search(&self, query: &Query) -> Result<RetrievalResult> {
        query.validate()?;
        let plan = QueryPlan::Nearest(self.config.dense_stage(query, query.limit));
        run_plan(self.store.as_ref(), &self.config, self.kind(), query, plan).await
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Dense
    }
}

/// BM25 matches on the sparse vector
pub struct SparseRetrieval {
    store: Arc<dyn SearchStore>,
    config: RetrievalConfig,
}

impl SparseRetrieval {
    pub fn new(store: Arc<dyn SearchStore>, config: RetrievalConfig) -> Self {
        Self { store, config }
    }
}

#[async_trait]
impl RetrievalStrategy for SparseRetrieval {
    async fn search(&self, query: &Query) -> Result<RetrievalResult> {
        query.validate()?;
        let plan = QueryPlan::Nearest(self.config.sparse_stage(query, query.limit));
        run_plan(self.store.as_ref(), &self.config, self.kind(), query, plan).await
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Sparse
    }
}

/// Dense prefetch of `limit × 5` candidates, narrowed to `limit` by a sparse query
pub struct PrefetchRerankRetrieval {
    store: Arc<dyn SearchStore>,
    config: RetrievalConfig,
}

impl PrefetchRerankRetrieval {
    pub fn new(store: Arc<dyn SearchStore>, config: RetrievalConfig) -> Self {
        Self { store, config }
    }
}

#[async_trait]
impl RetrievalStrategy for PrefetchRerankRetrieval {
    async fn search(&self, query: &Query) -> Result<RetrievalResult> {
        query.validate()?;
        let plan = QueryPlan::Rerank {
            prefetch: self
                .config
                .dense_stage(query, prefetch_pool(query.limit)),
            rerank: self.config.sparse_stage(query, query.limit),
        };
        run_plan(self.store.as_ref(), &self.config, self.kind(), query, plan).await
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::PrefetchRerank
    }
}

/// Dense and sparse prefetch, each `limit × 5`, fused with RRF and cut to `limit`
pub struct FusedRetrieval {
    store: Arc<dyn SearchStore>,
    config: RetrievalConfig,
}

impl FusedRetrieval {
    pub fn new(store: Arc<dyn SearchStore>, config: RetrievalConfig) -> Self {
        Self { store, config }
    }
}

#[async_trait]
impl RetrievalStrategy for FusedRetrieval {
    async fn search(&self, query: &Query) -> Result<RetrievalResult> {
        query.validate()?;
        let pool = prefetch_pool(query.limit);
        let plan = QueryPlan::Fused {
            prefetch: vec![
                self.config.dense_stage(query, pool),
                self.config.sparse_stage(query, pool),
            ],
            limit: query.limit as u64,
        };
        run_plan(self.store.as_ref(), &self.config, self.kind(), query, plan).await
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Fused
    }
}

/// Build the store-backed strategy named in `config.strategy`
///
/// Keyword search is fitted from documents with
/// [`KeywordRetrieval::fit`](super::keyword::KeywordRetrieval::fit) instead.
pub fn build_strategy(
    store: Arc<dyn SearchStore>,
    config: RetrievalConfig,
) -> Result<Arc<dyn RetrievalStrategy>> {
    Ok(match config.strategy {
        StrategyKind::Dense => Arc::new(DenseRetrieval::new(store, config)),
        StrategyKind::Sparse => Arc::new(SparseRetrieval::new(store, config)),
        StrategyKind::PrefetchRerank => Arc::new(PrefetchRerankRetrieval::new(store, config)),
        StrategyKind::Fused => Arc::new(FusedRetrieval::new(store, config)),
        StrategyKind::Keyword => {
            return Err(RagError::Config(
                "Keyword search runs over loaded documents, not a store collection".to_string(),
            ))
        }
    })
}

/// Reject strategy/collection combinations that cannot work
pub fn check_layout(
    kind: StrategyKind,
    layout: &crate::store::CollectionLayout,
) -> Result<()> {
    let needs_dense = matches!(
        kind,
        StrategyKind::Dense | StrategyKind::PrefetchRerank | StrategyKind::Fused
    );
    let needs_sparse = matches!(
        kind,
        StrategyKind::Sparse | StrategyKind::PrefetchRerank | StrategyKind::Fused
    );

    if needs_dense && layout.dense().is_none() {
        return Err(RagError::Config(format!(
            "Strategy {} needs a dense vector in the collection",
            kind
        )));
    }
    if needs_sparse && layout.sparse().is_none() {
        return Err(RagError::Config(format!(
            "Strategy {} needs a sparse vector in the collection",
            kind
        )));
    }
    Ok(())
}
