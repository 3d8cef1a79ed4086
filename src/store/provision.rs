// Idempotent collection provisioning
use std::sync::Arc;

use crate::errors::Result;
use crate::store::{CollectionSpec, SearchStore};

/// What `ensure` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Created,
    AlreadyExists,
}

/// Creates collections that do not exist yet.
///
/// An existing collection is left untouched and its configuration is not
/// compared with the requested one, so re-provisioning cannot repair a
/// misconfigured collection.
pub struct Provisioner {
    store: Arc<dyn SearchStore>,
}

impl Provisioner {
    pub fn new(store: Arc<dyn SearchStore>) -> Self {
        Self { store }
    }

    /// Create the collection unless one with the same name exists
    pub async fn ensure(&self, spec: &CollectionSpec) -> Result<ProvisionOutcome> {
        if self.store.collection_exists(&spec.name).await? {
            tracing::info!(collection = %spec.name, "Collection already exists");
            return Ok(ProvisionOutcome::AlreadyExists);
        }

        self.store.create_collection(spec).await?;
        tracing::info!(collection = %spec.name, layout = ?spec.layout, "Created collection");

        Ok(ProvisionOutcome::Created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CollectionLayout, InMemoryStore, SparseConfig, SparseModifier};

    fn sparse_spec(name: &str) -> CollectionSpec {
        CollectionSpec {
            name: name.to_string(),
            layout: CollectionLayout::Sparse(SparseConfig {
                vector_name: "bm25".to_string(),
                modifier: SparseModifier::Idf,
                model: "Qdrant/bm25".to_string(),
            }),
        }
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let store = Arc::new(InMemoryStore::new());
        let provisioner = Provisioner::new(store.clone());
        let spec = sparse_spec("zoomcamp-rag-sparse");

        assert_eq!(provisioner.ensure(&spec).await.unwrap(), ProvisionOutcome::Created);
        assert_eq!(
            provisioner.ensure(&spec).await.unwrap(),
            ProvisionOutcome::AlreadyExists
        );
        assert_eq!(store.collection_names(), vec!["zoomcamp-rag-sparse".to_string()]);
    }

    #[tokio::test]
    async fn test_existing_collection_is_not_reconfigured() {
        let store = Arc::new(InMemoryStore::new());
        let provisioner = Provisioner::new(store.clone());
        provisioner.ensure(&sparse_spec("faq")).await.unwrap();

        let mut changed = sparse_spec("faq");
        if let CollectionLayout::Sparse(sparse) = &mut changed.layout {
            sparse.vector_name = "other".to_string();
        }

        assert_eq!(
            provisioner.ensure(&changed).await.unwrap(),
            ProvisionOutcome::AlreadyExists
        );
        let spec = store.collection_spec("faq").unwrap();
        assert_eq!(spec.layout.sparse().unwrap().vector_name, "bm25");
    }
}
