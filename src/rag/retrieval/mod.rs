// Retrieval strategies and the engine that drives them
pub mod engine;
pub mod keyword;
pub mod strategies;
pub mod types;

pub use engine::{RetrievalEngine, SearchParams};
pub use keyword::{FieldBoosts, KeywordRetrieval};
pub use strategies::{
    build_strategy, check_layout, DenseRetrieval, FusedRetrieval, PrefetchRerankRetrieval,
    RetrievalConfig, RetrievalStrategy, SparseRetrieval, PREFETCH_MULTIPLIER,
};
pub use types::{Query, RetrievalResult, ScoredMatch, StrategyKind};
