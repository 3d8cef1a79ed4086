// Document indexing: documents -> points -> batched upserts
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::documents::Document;
use crate::errors::{RagError, Result};
use crate::store::{CollectionSpec, NamedInput, Payload, Point, PointId, SearchStore, TextInput};

/// Default number of points per upsert request
pub const DEFAULT_BATCH_SIZE: usize = 256;

/// How point ids are assigned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum IdScheme {
    /// 0, 1, 2, ... in load order; re-indexing overwrites
    Sequential,
    /// Random v4 UUIDs; re-indexing duplicates
    #[default]
    Uuid,
}

/// Outcome of an indexing run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexReport {
    pub documents: usize,
    pub batches: usize,
}

/// Writes documents into a collection, one vector per configured vector name
pub struct DocumentIndexer {
    store: Arc<dyn SearchStore>,
    spec: CollectionSpec,
    id_scheme: IdScheme,
    batch_size: usize,
}

impl DocumentIndexer {
    pub fn new(store: Arc<dyn SearchStore>, spec: CollectionSpec) -> Self {
        Self {
            store,
            spec,
            id_scheme: IdScheme::default(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_id_scheme(mut self, id_scheme: IdScheme) -> Self {
        self.id_scheme = id_scheme;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Build the point for the `ordinal`-th document
    pub fn point(&self, ordinal: usize, document: &Document) -> Result<Point> {
        let id = match self.id_scheme {
            IdScheme::Sequential => PointId::Num(ordinal as u64),
            IdScheme::Uuid => PointId::Uuid(Uuid::new_v4().to_string()),
        };

        let mut vectors = Vec::with_capacity(2);
        if let Some(dense) = self.spec.layout.dense() {
            vectors.push(NamedInput {
                vector_name: dense.vector_name.clone(),
                input: TextInput::new(document.text.clone(), dense.model.clone()),
            });
        }
        if let Some(sparse) = self.spec.layout.sparse() {
            vectors.push(NamedInput {
                vector_name: Some(sparse.vector_name.clone()),
                input: TextInput::new(document.text.clone(), sparse.model.clone()),
            });
        }

        let payload: Payload = match serde_json::to_value(document)? {
            serde_json::Value::Object(map) => map,
            _ => {
                return Err(RagError::malformed(
                    &self.spec.name,
                    "document did not serialize to an object",
                ))
            }
        };

        Ok(Point {
            id,
            vectors,
            payload,
        })
    }

    /// Upsert all documents in batches
    pub async fn index(&self, documents: &[Document]) -> Result<IndexReport> {
        self.index_with_progress(documents, |_| {}).await
    }

    /// Like [`index`](Self::index), calling `on_batch` with the running document count
    pub async fn index_with_progress<F>(
        &self,
        documents: &[Document],
        mut on_batch: F,
    ) -> Result<IndexReport>
    where
        F: FnMut(usize) + Send,
    {
        let mut written = 0;
        let mut batches = 0;

        for chunk in documents.chunks(self.batch_size) {
            let points = chunk
                .iter()
                .enumerate()
                .map(|(offset, doc)| self.point(written + offset, doc))
                .collect::<Result<Vec<_>>>()?;

            self.store.upsert(&self.spec.name, points).await?;
            written += chunk.len();
            batches += 1;
            tracing::debug!(collection = %self.spec.name, written, "Upserted batch");
            on_batch(written);
        }

        tracing::info!(
            collection = %self.spec.name,
            documents = written,
            batches,
            "Indexed documents"
        );

        Ok(IndexReport {
            documents: written,
            batches,
        })
    }
}
