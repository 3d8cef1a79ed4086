// Qdrant-backed search store with server-side inference
use async_trait::async_trait;
use qdrant_client::qdrant::{
    point_id::PointIdOptions, Condition, CountPointsBuilder, CreateCollectionBuilder,
    Distance as QdrantDistance, Document, Filter, Modifier, NamedVectors,
    PointId as QdrantPointId, PointStruct, PrefetchQueryBuilder, Query, QueryPoints,
    QueryPointsBuilder, RrfBuilder, SparseVectorParamsBuilder, SparseVectorsConfigBuilder,
    UpsertPointsBuilder, VectorParamsBuilder, VectorsConfigBuilder,
};
use qdrant_client::{Payload as QdrantPayload, Qdrant, QdrantError};

use crate::errors::{RagError, Result};
use crate::rag::fusion::RRF_K;
use crate::store::{
    CollectionLayout, CollectionSpec, Distance, FieldFilter, Payload, Point, PointId, QueryPlan,
    QueryStage, ScoredPoint, SearchStore, SparseModifier, StoreQuery,
};

/// Name Qdrant uses for a collection's unnamed vector
const DEFAULT_VECTOR: &str = "";

/// Search store backed by a Qdrant server
pub struct QdrantStore {
    client: Qdrant,
    url: String,
}

impl QdrantStore {
    /// Connect to Qdrant (gRPC endpoint, e.g. http://localhost:6334)
    pub fn new(url: &str, api_key: Option<String>) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .api_key(api_key)
            .build()
            .map_err(|e| RagError::StoreUnavailable(format!("Failed to create Qdrant client: {}", e)))?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Server-side inference failures are reported with an "Inference error" /
/// "inference service" status message; only those count as embedding errors.
fn is_inference_failure(status_message: &str) -> bool {
    status_message.to_lowercase().contains("inference")
}

fn map_err(context: &str, err: QdrantError) -> RagError {
    let inference = match &err {
        QdrantError::ResponseError { status } => is_inference_failure(status.message()),
        _ => false,
    };

    if inference {
        RagError::Embedding(format!("{}: {}", context, err))
    } else {
        RagError::StoreUnavailable(format!("{}: {}", context, err))
    }
}

fn distance(distance: Distance) -> QdrantDistance {
    match distance {
        Distance::Cosine => QdrantDistance::Cosine,
        Distance::Dot => QdrantDistance::Dot,
        Distance::Euclid => QdrantDistance::Euclid,
    }
}

fn filter(filter: &FieldFilter) -> Filter {
    Filter::must([Condition::matches(filter.key.clone(), filter.value.clone())])
}

fn stage_query(stage: &QueryStage) -> Query {
    Query::new_nearest(Document::new(
        stage.input.text.clone(),
        stage.input.model.clone(),
    ))
}

fn prefetch(stage: &QueryStage) -> PrefetchQueryBuilder {
    let mut builder = PrefetchQueryBuilder::default()
        .query(stage_query(stage))
        .limit(stage.limit);
    if let Some(using) = &stage.using {
        builder = builder.using(using.clone());
    }
    if let Some(f) = &stage.filter {
        builder = builder.filter(filter(f));
    }
    builder
}

fn point_struct(point: Point) -> PointStruct {
    let mut vectors = NamedVectors::default();
    for named in point.vectors {
        let name = named.vector_name.unwrap_or_else(|| DEFAULT_VECTOR.to_string());
        vectors = vectors.add_vector(name, Document::new(named.input.text, named.input.model));
    }

    let payload = QdrantPayload::from(point.payload);

    let id = match point.id {
        PointId::Num(n) => QdrantPointId::from(n),
        PointId::Uuid(u) => QdrantPointId::from(u),
    };

    PointStruct::new(id, vectors, payload)
}

/// Translate a store query into a Qdrant `QueryPoints` request
fn query_points(query: &StoreQuery) -> QueryPoints {
    let builder = QueryPointsBuilder::new(query.collection.clone()).with_payload(true);

    let builder = match &query.plan {
        QueryPlan::Nearest(stage) => {
            let mut b = builder.query(stage_query(stage)).limit(stage.limit);
            if let Some(using) = &stage.using {
                b = b.using(using.clone());
            }
            if let Some(f) = &stage.filter {
                b = b.filter(filter(f));
            }
            b
        }
        QueryPlan::Rerank { prefetch: pre, rerank } => {
            let mut b = builder
                .add_prefetch(prefetch(pre))
                .query(stage_query(rerank))
                .limit(rerank.limit);
            if let Some(using) = &rerank.using {
                b = b.using(using.clone());
            }
            if let Some(f) = &rerank.filter {
                b = b.filter(filter(f));
            }
            b
        }
        QueryPlan::Fused { prefetch: stages, limit } => {
            let mut b = builder;
            for stage in stages {
                b = b.add_prefetch(prefetch(stage));
            }
            // server default k differs from ours; always send it
            b.query(Query::new_rrf(RrfBuilder::with_k(RRF_K as u32)))
                .limit(*limit)
        }
    };

    builder.build()
}

#[async_trait]
impl SearchStore for QdrantStore {
    async fn collection_exists(&self, name: &str) -> Result<bool> {
        self.client
            .collection_exists(name)
            .await
            .map_err(|e| map_err("Failed to check collection", e))
    }

    async fn create_collection(&self, spec: &CollectionSpec) -> Result<()> {
        let mut builder = CreateCollectionBuilder::new(spec.name.clone());

        if let Some(dense) = spec.layout.dense() {
            let params = VectorParamsBuilder::new(dense.size, distance(dense.distance));
            builder = match &dense.vector_name {
                Some(name) => {
                    let mut named = VectorsConfigBuilder::default();
                    named.add_named_vector_params(name.clone(), params);
                    builder.vectors_config(named)
                }
                None => builder.vectors_config(params),
            };
        }

        if let Some(sparse) = spec.layout.sparse() {
            let mut params = SparseVectorParamsBuilder::default();
            if sparse.modifier == SparseModifier::Idf {
                params = params.modifier(Modifier::Idf);
            }
            let mut sparse_config = SparseVectorsConfigBuilder::default();
            sparse_config.add_named_vector_params(sparse.vector_name.clone(), params);
            builder = builder.sparse_vectors_config(sparse_config);
        }

        if matches!(spec.layout, CollectionLayout::Hybrid { .. }) {
            tracing::debug!(collection = %spec.name, "Creating hybrid collection");
        }

        self.client
            .create_collection(builder)
            .await
            .map_err(|e| map_err(&format!("Failed to create collection {}", spec.name), e))?;

        Ok(())
    }

    async fn upsert(&self, collection: &str, points: Vec<Point>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        let points: Vec<PointStruct> = points.into_iter().map(point_struct).collect();
        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await
            .map_err(|e| map_err("Failed to upsert points", e))?;

        Ok(())
    }

    async fn query(&self, query: &StoreQuery) -> Result<Vec<ScoredPoint>> {
        let response = self
            .client
            .query(query_points(query))
            .await
            .map_err(|e| map_err("Failed to query points", e))?;

        Ok(response
            .result
            .into_iter()
            .map(|point| ScoredPoint {
                id: point_id(&point.id),
                score: point.score,
                payload: Payload::from(QdrantPayload::from(point.payload)),
            })
            .collect())
    }

    async fn count(&self, collection: &str) -> Result<u64> {
        let response = self
            .client
            .count(CountPointsBuilder::new(collection).exact(true))
            .await
            .map_err(|e| map_err("Failed to count points", e))?;

        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }
}

fn point_id(point_id: &Option<QdrantPointId>) -> PointId {
    match point_id.as_ref().and_then(|id| id.point_id_options.as_ref()) {
        Some(PointIdOptions::Num(n)) => PointId::Num(*n),
        Some(PointIdOptions::Uuid(u)) => PointId::Uuid(u.clone()),
        None => PointId::Uuid("unknown".to_string()),
    }
}
