// Retrieval-augmented generation over course FAQ documents
//
// Components:
// - Retrieval: dense, sparse, prefetch+rerank, fused and keyword strategies
// - Fusion: reciprocal rank fusion
// - Context Builder: one context string from ranked matches
// - Prompt: course-assistant prompt template
// - Pipeline: retrieve -> context -> prompt -> answer
// - Evaluation: hit rate and MRR over ground truth

pub mod context;
pub mod evaluation;
pub mod fusion;
pub mod pipeline;
pub mod prompt;
pub mod retrieval;

// Re-export key types
pub use context::{AssembledContext, ContextBuilder, ContextConfig};
pub use evaluation::{evaluate, EvaluationReport, GroundTruth};
pub use pipeline::{RagAnswer, RagPipeline};
pub use prompt::PromptTemplate;
pub use retrieval::{
    build_strategy, FieldBoosts, KeywordRetrieval, Query, RetrievalConfig, RetrievalEngine, RetrievalResult, RetrievalStrategy,
    ScoredMatch, SearchParams, StrategyKind,
};
