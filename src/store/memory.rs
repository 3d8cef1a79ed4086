//! In-process search store
//!
//! Keeps collections in memory and scores them exhaustively. Dense vectors
//! come from [`HashEmbedder`] (feature hashing of tokens), sparse scoring is
//! BM25 with collection-wide IDF, and fused plans use the same reciprocal
//! rank fusion as the rest of the crate. Used for offline runs and tests; the
//! model names in inputs must match the ones the collection was created with.

use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::errors::{RagError, Result};
use crate::rag::fusion::{reciprocal_rank_fusion, RRF_K};
use crate::store::{
    CollectionSpec, DenseConfig, Distance, Payload, Point, PointId, QueryPlan, QueryStage,
    ScoredPoint, SearchStore, SparseConfig, SparseModifier, StoreQuery,
};

const BM25_K1: f32 = 1.2;
const BM25_B: f32 = 0.75;

/// Lowercased alphanumeric tokens
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Deterministic bag-of-words embedder using the hashing trick
#[derive(Debug, Clone, Copy)]
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    /// L2-normalised embedding; all zeros for text without tokens
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dim];

        for token in tokenize(text) {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let h = hasher.finish();
            let bucket = (h % self.dim as u64) as usize;
            let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in vector.iter_mut() {
                *x /= norm;
            }
        }
        vector
    }
}

fn vector_key(name: Option<&str>) -> &str {
    name.unwrap_or("")
}

fn similarity(distance: Distance, a: &[f32], b: &[f32]) -> f32 {
    match distance {
        // embeddings are already unit length
        Distance::Cosine | Distance::Dot => a.iter().zip(b).map(|(x, y)| x * y).sum(),
        Distance::Euclid => -a
            .iter()
            .zip(b)
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            .sqrt(),
    }
}

#[derive(Debug, Clone)]
struct StoredPoint {
    id: PointId,
    payload: Payload,
    dense: HashMap<String, Vec<f32>>,
    sparse: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone)]
struct MemoryCollection {
    spec: CollectionSpec,
    points: Vec<StoredPoint>,
}

enum ResolvedVector<'a> {
    Dense(&'a DenseConfig),
    Sparse(&'a SparseConfig),
}

impl MemoryCollection {
    fn resolve(&self, name: Option<&str>, model: &str) -> Result<ResolvedVector<'_>> {
        let key = vector_key(name);

        if let Some(dense) = self.spec.layout.dense() {
            if vector_key(dense.vector_name.as_deref()) == key {
                if dense.model != model {
                    return Err(RagError::Embedding(format!(
                        "Vector '{}' expects model {}, got {}",
                        key, dense.model, model
                    )));
                }
                return Ok(ResolvedVector::Dense(dense));
            }
        }

        if let Some(sparse) = self.spec.layout.sparse() {
            if sparse.vector_name == key {
                if sparse.model != model {
                    return Err(RagError::Embedding(format!(
                        "Vector '{}' expects model {}, got {}",
                        key, sparse.model, model
                    )));
                }
                return Ok(ResolvedVector::Sparse(sparse));
            }
        }

        Err(RagError::Embedding(format!(
            "Collection {} has no vector named '{}'",
            self.spec.name, key
        )))
    }

    fn upsert(&mut self, point: Point) -> Result<()> {
        let mut stored = StoredPoint {
            id: point.id,
            payload: point.payload,
            dense: HashMap::new(),
            sparse: HashMap::new(),
        };

        for named in point.vectors {
            match self.resolve(named.vector_name.as_deref(), &named.input.model)? {
                ResolvedVector::Dense(dense) => {
                    let embedder = HashEmbedder::new(dense.size as usize);
                    stored.dense.insert(
                        vector_key(dense.vector_name.as_deref()).to_string(),
                        embedder.embed(&named.input.text),
                    );
                }
                ResolvedVector::Sparse(sparse) => {
                    stored
                        .sparse
                        .insert(sparse.vector_name.clone(), tokenize(&named.input.text));
                }
            }
        }

        match self.points.iter_mut().find(|p| p.id == stored.id) {
            Some(existing) => *existing = stored,
            None => self.points.push(stored),
        }
        Ok(())
    }

    /// Score one stage; returns (point index, score) best first
    fn run_stage(
        &self,
        stage: &QueryStage,
        candidates: Option<&HashSet<PointId>>,
    ) -> Result<Vec<(usize, f32)>> {
        let eligible = |p: &StoredPoint| {
            candidates.map(|c| c.contains(&p.id)).unwrap_or(true)
                && stage
                    .filter
                    .as_ref()
                    .map(|f| f.matches(&p.payload))
                    .unwrap_or(true)
        };

        let mut scored: Vec<(usize, f32)> =
            match self.resolve(stage.using.as_deref(), &stage.input.model)? {
                ResolvedVector::Dense(dense) => {
                    let key = vector_key(dense.vector_name.as_deref());
                    let query = HashEmbedder::new(dense.size as usize).embed(&stage.input.text);
                    self.points
                        .iter()
                        .enumerate()
                        .filter(|(_, p)| eligible(*p))
                        .filter_map(|(idx, p)| {
                            p.dense
                                .get(key)
                                .map(|v| (idx, similarity(dense.distance, &query, v)))
                        })
                        .collect()
                }
                ResolvedVector::Sparse(sparse) => self.bm25(sparse, &stage.input.text, &eligible),
            };

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(stage.limit as usize);
        Ok(scored)
    }

    fn bm25(
        &self,
        sparse: &SparseConfig,
        query: &str,
        eligible: &dyn Fn(&StoredPoint) -> bool,
    ) -> Vec<(usize, f32)> {
        let mut terms = tokenize(query);
        let mut seen = HashSet::new();
        terms.retain(|t| seen.insert(t.clone()));

        let docs: Vec<(usize, &Vec<String>)> = self
            .points
            .iter()
            .enumerate()
            .filter_map(|(idx, p)| p.sparse.get(&sparse.vector_name).map(|t| (idx, t)))
            .collect();
        if terms.is_empty() || docs.is_empty() {
            return Vec::new();
        }

        let n = docs.len() as f32;
        let avgdl = docs.iter().map(|(_, t)| t.len()).sum::<usize>() as f32 / n;
        let avgdl = if avgdl > 0.0 { avgdl } else { 1.0 };

        let idf: HashMap<&str, f32> = terms
            .iter()
            .map(|term| {
                let df = docs.iter().filter(|(_, t)| t.contains(term)).count() as f32;
                let weight = match sparse.modifier {
                    SparseModifier::Idf => ((n - df + 0.5) / (df + 0.5) + 1.0).ln(),
                    SparseModifier::None => 1.0,
                };
                (term.as_str(), weight)
            })
            .collect();

        docs.into_iter()
            .filter(|(idx, _)| eligible(&self.points[*idx]))
            .filter_map(|(idx, tokens)| {
                let dl = tokens.len() as f32;
                let score: f32 = terms
                    .iter()
                    .map(|term| {
                        let tf = tokens.iter().filter(|t| *t == term).count() as f32;
                        if tf == 0.0 {
                            return 0.0;
                        }
                        let tf_norm =
                            (tf * (BM25_K1 + 1.0)) / (tf + BM25_K1 * (1.0 - BM25_B + BM25_B * dl / avgdl));
                        idf[term.as_str()] * tf_norm
                    })
                    .sum();
                (score > 0.0).then_some((idx, score))
            })
            .collect()
    }

    fn to_scored(&self, hits: Vec<(usize, f32)>) -> Vec<ScoredPoint> {
        hits.into_iter()
            .map(|(idx, score)| {
                let point = &self.points[idx];
                ScoredPoint {
                    id: point.id.clone(),
                    score,
                    payload: point.payload.clone(),
                }
            })
            .collect()
    }
}

/// In-memory [`SearchStore`]
#[derive(Debug, Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, MemoryCollection>>> {
        self.collections
            .read()
            .map_err(|e| RagError::StoreUnavailable(format!("Lock error: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, MemoryCollection>>> {
        self.collections
            .write()
            .map_err(|e| RagError::StoreUnavailable(format!("Lock error: {}", e)))
    }

    /// Names of all collections, sorted
    pub fn collection_names(&self) -> Vec<String> {
        let collections = self.collections.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = collections.keys().cloned().collect();
        names.sort();
        names
    }

    /// Configuration a collection was created with
    pub fn collection_spec(&self, name: &str) -> Option<CollectionSpec> {
        let collections = self.collections.read().unwrap_or_else(|e| e.into_inner());
        collections.get(name).map(|c| c.spec.clone())
    }
}

fn missing_collection(name: &str) -> RagError {
    RagError::StoreUnavailable(format!("Collection {} not found", name))
}

#[async_trait]
impl SearchStore for InMemoryStore {
    async fn collection_exists(&self, name: &str) -> Result<bool> {
        Ok(self.read()?.contains_key(name))
    }

    async fn create_collection(&self, spec: &CollectionSpec) -> Result<()> {
        let mut collections = self.write()?;
        if collections.contains_key(&spec.name) {
            return Err(RagError::StoreUnavailable(format!(
                "Collection {} already exists",
                spec.name
            )));
        }

        collections.insert(
            spec.name.clone(),
            MemoryCollection {
                spec: spec.clone(),
                points: Vec::new(),
            },
        );
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: Vec<Point>) -> Result<()> {
        let mut collections = self.write()?;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| missing_collection(collection))?;

        for point in points {
            target.upsert(point)?;
        }
        Ok(())
    }

    async fn query(&self, query: &StoreQuery) -> Result<Vec<ScoredPoint>> {
        let collections = self.read()?;
        let collection = collections
            .get(&query.collection)
            .ok_or_else(|| missing_collection(&query.collection))?;

        match &query.plan {
            QueryPlan::Nearest(stage) => {
                let hits = collection.run_stage(stage, None)?;
                Ok(collection.to_scored(hits))
            }
            QueryPlan::Rerank { prefetch, rerank } => {
                let pool: HashSet<PointId> = collection
                    .run_stage(prefetch, None)?
                    .into_iter()
                    .map(|(idx, _)| collection.points[idx].id.clone())
                    .collect();
                let hits = collection.run_stage(rerank, Some(&pool))?;
                Ok(collection.to_scored(hits))
            }
            QueryPlan::Fused { prefetch, limit } => {
                let mut lists = Vec::with_capacity(prefetch.len());
                for stage in prefetch {
                    let ranked: Vec<usize> = collection
                        .run_stage(stage, None)?
                        .into_iter()
                        .map(|(idx, _)| idx)
                        .collect();
                    lists.push(ranked);
                }

                let mut fused = reciprocal_rank_fusion(&lists, RRF_K);
                fused.truncate(*limit as usize);
                Ok(collection.to_scored(fused))
            }
        }
    }

    async fn count(&self, collection: &str) -> Result<u64> {
        let collections = self.read()?;
        collections
            .get(collection)
            .map(|c| c.points.len() as u64)
            .ok_or_else(|| missing_collection(collection))
    }
}
