//! Search store abstraction
//!
//! The retrieval core talks to a collection-oriented store through
//! [`SearchStore`]. Embedding and term weighting are delegated to the store:
//! points and queries carry raw text plus the name of the model that should
//! vectorise it.
//!
//! Implementations:
//! - [`QdrantStore`]: Qdrant over gRPC with server-side inference
//! - [`InMemoryStore`]: in-process store for offline runs and tests

pub mod memory;
pub mod provision;
pub mod qdrant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;

use crate::errors::Result;

pub use memory::{HashEmbedder, InMemoryStore};
pub use provision::{ProvisionOutcome, Provisioner};
pub use qdrant::QdrantStore;

/// Payload attached to a stored point
pub type Payload = Map<String, JsonValue>;

/// Vector similarity metric for dense vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distance {
    Cosine,
    Dot,
    Euclid,
}

/// Term weight modifier for sparse vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SparseModifier {
    None,
    Idf,
}

/// Dense vector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseConfig {
    /// Vector name; `None` is the collection's unnamed default vector
    pub vector_name: Option<String>,
    pub size: u64,
    pub distance: Distance,
    /// Embedding model the store applies to text inputs
    pub model: String,
}

/// Sparse vector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseConfig {
    pub vector_name: String,
    pub modifier: SparseModifier,
    /// Term-weighting model the store applies to text inputs
    pub model: String,
}

/// Which vectors a collection carries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CollectionLayout {
    Dense(DenseConfig),
    Sparse(SparseConfig),
    Hybrid {
        dense: DenseConfig,
        sparse: SparseConfig,
    },
}

impl CollectionLayout {
    pub fn dense(&self) -> Option<&DenseConfig> {
        match self {
            CollectionLayout::Dense(dense) | CollectionLayout::Hybrid { dense, .. } => Some(dense),
            CollectionLayout::Sparse(_) => None,
        }
    }

    pub fn sparse(&self) -> Option<&SparseConfig> {
        match self {
            CollectionLayout::Sparse(sparse) | CollectionLayout::Hybrid { sparse, .. } => {
                Some(sparse)
            }
            CollectionLayout::Dense(_) => None,
        }
    }
}

/// Collection name plus its vector layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSpec {
    pub name: String,
    pub layout: CollectionLayout,
}

/// Point identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointId {
    Num(u64),
    Uuid(String),
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointId::Num(n) => write!(f, "{}", n),
            PointId::Uuid(u) => write!(f, "{}", u),
        }
    }
}

/// Raw text the store turns into a vector with the named model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextInput {
    pub text: String,
    pub model: String,
}

impl TextInput {
    pub fn new(text: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: model.into(),
        }
    }
}

/// One vector of a point, addressed by vector name (`None` = default vector)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedInput {
    pub vector_name: Option<String>,
    pub input: TextInput,
}

/// A point to upsert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: PointId,
    pub vectors: Vec<NamedInput>,
    pub payload: Payload,
}

/// Exact-match equality on a payload field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFilter {
    pub key: String,
    pub value: String,
}

impl FieldFilter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, payload: &Payload) -> bool {
        payload
            .get(&self.key)
            .and_then(JsonValue::as_str)
            .map(|v| v == self.value)
            .unwrap_or(false)
    }
}

/// Nearest-neighbour search against one vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryStage {
    pub input: TextInput,
    /// Vector to search; `None` = default vector
    pub using: Option<String>,
    pub filter: Option<FieldFilter>,
    pub limit: u64,
}

/// Shape of a store query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryPlan {
    /// Single nearest-neighbour stage
    Nearest(QueryStage),
    /// Rank only the candidates returned by `prefetch` using `rerank`
    Rerank {
        prefetch: QueryStage,
        rerank: QueryStage,
    },
    /// Merge the prefetch rankings with reciprocal rank fusion
    Fused { prefetch: Vec<QueryStage>, limit: u64 },
}

/// A complete query against one collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreQuery {
    pub collection: String,
    pub plan: QueryPlan,
}

/// A point returned by a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub id: PointId,
    pub score: f32,
    pub payload: Payload,
}

/// Collection-oriented search store
#[async_trait]
pub trait SearchStore: Send + Sync {
    /// Check whether a collection exists
    async fn collection_exists(&self, name: &str) -> Result<bool>;

    /// Create a collection; callers check existence first
    async fn create_collection(&self, spec: &CollectionSpec) -> Result<()>;

    /// Insert or replace points
    async fn upsert(&self, collection: &str, points: Vec<Point>) -> Result<()>;

    /// Run a query, best match first
    async fn query(&self, query: &StoreQuery) -> Result<Vec<ScoredPoint>>;

    /// Number of points in a collection
    async fn count(&self, collection: &str) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dense() -> DenseConfig {
        DenseConfig {
            vector_name: Some("jina-small".to_string()),
            size: 512,
            distance: Distance::Cosine,
            model: "jinaai/jina-embeddings-v2-small-en".to_string(),
        }
    }

    fn sparse() -> SparseConfig {
        SparseConfig {
            vector_name: "bm25".to_string(),
            modifier: SparseModifier::Idf,
            model: "Qdrant/bm25".to_string(),
        }
    }

    #[test]
    fn test_layout_accessors() {
        assert!(CollectionLayout::Dense(dense()).sparse().is_none());
        assert!(CollectionLayout::Sparse(sparse()).dense().is_none());

        let hybrid = CollectionLayout::Hybrid {
            dense: dense(),
            sparse: sparse(),
        };
        assert_eq!(hybrid.dense().unwrap().size, 512);
        assert_eq!(hybrid.sparse().unwrap().vector_name, "bm25");
    }

    #[test]
    fn test_field_filter_matches_strings_only() {
        let filter = FieldFilter::new("course", "mlops-zoomcamp");

        let payload = json!({"course": "mlops-zoomcamp"});
        assert!(filter.matches(payload.as_object().unwrap()));

        let other = json!({"course": "llm-zoomcamp"});
        assert!(!filter.matches(other.as_object().unwrap()));

        let missing = json!({"section": "General"});
        assert!(!filter.matches(missing.as_object().unwrap()));
    }

    #[test]
    fn test_point_id_display() {
        assert_eq!(PointId::Num(7).to_string(), "7");
        assert_eq!(PointId::Uuid("abc".to_string()).to_string(), "abc");
    }
}
