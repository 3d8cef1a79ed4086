//! Configuration
//!
//! Built in layers: defaults, then `~/.coursebuddy/config.toml` (or an
//! explicit `--config` file), then `.env` and process environment variables.
//! The resulting [`Config`] is passed into constructors; nothing reads the
//! environment after startup.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::documents::{IdScheme, SourceLocator};
use crate::errors::{RagError, Result};
use crate::rag::context::ContextConfig;
use crate::rag::retrieval::{FieldBoosts, RetrievalConfig, SearchParams, StrategyKind};
use crate::store::{
    CollectionLayout, CollectionSpec, DenseConfig, Distance, SparseConfig, SparseModifier,
};

/// Dense vector name in hybrid collections
pub const DEFAULT_DENSE_VECTOR: &str = "jina-small";

pub const DEFAULT_DOCS_URL: &str =
    "https://github.com/alexeygrigorev/llm-rag-workshop/raw/main/notebooks/documents.json";

/// Which search store backs the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Qdrant server with inference
    Qdrant,
    /// In-process store; documents are indexed on every run
    Memory,
}

/// Vectors a newly provisioned collection carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LayoutKind {
    Dense,
    Sparse,
    Hybrid,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalSettings,
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: Backend,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub collection: String,
    pub layout: LayoutKind,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Qdrant,
            url: "http://localhost:6334".to_string(),
            api_key: None,
            collection: "zoomcamp-rag".to_string(),
            layout: LayoutKind::Hybrid,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentsConfig {
    /// File paths or http(s) URLs
    pub sources: Vec<String>,
    pub id_scheme: IdScheme,
    pub batch_size: usize,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            sources: vec![DEFAULT_DOCS_URL.to_string()],
            id_scheme: IdScheme::Uuid,
            batch_size: crate::documents::indexer::DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub dimensionality: u64,
    pub distance: Distance,
    pub dense_model: String,
    /// Unset: unnamed vector for the dense layout, `jina-small` otherwise.
    /// An empty string forces the unnamed vector.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dense_vector: Option<String>,
    pub sparse_model: String,
    pub sparse_vector: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimensionality: 512,
            distance: Distance::Cosine,
            dense_model: "jinaai/jina-embeddings-v2-small-en".to_string(),
            dense_vector: None,
            sparse_model: "Qdrant/bm25".to_string(),
            sparse_vector: "bm25".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub strategy: StrategyKind,
    pub limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
    pub include_question: bool,
    /// Field weights for keyword search
    pub boosts: FieldBoosts,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Fused,
            limit: 5,
            course: None,
            include_question: false,
            boosts: FieldBoosts::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: crate::llm::client::DEFAULT_OPENAI_URL.to_string(),
            model: crate::llm::client::DEFAULT_MODEL.to_string(),
            api_key: None,
            request_timeout_secs: 60,
        }
    }
}

impl Config {
    /// Load configuration: file (if any), then `.env`, then environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Self::config_path()?;
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Config::default()
                }
            }
        };

        if let Ok(env_file) = dotenvy::dotenv() {
            tracing::debug!(path = %env_file.display(), "Loaded .env");
        }
        config.apply_env(|key| std::env::var(key).ok());

        Ok(config)
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            RagError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        toml::from_str(&contents).map_err(|e| {
            RagError::Config(format!("Failed to parse config file {}: {}", path.display(), e))
        })
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| RagError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)?;
        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| RagError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".coursebuddy").join("config.toml"))
    }

    /// Override fields from environment-style variables
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("QDRANT_URL").or_else(|| get("QDRANT_CLIENT")) {
            self.store.url = url;
        }
        if let Some(key) = get("QDRANT_API_KEY") {
            self.store.api_key = Some(key);
        }
        if let Some(collection) = get("COLLECTION_NAME") {
            self.store.collection = collection;
        }
        if let Some(url) = get("DOCS_URL") {
            self.documents.sources = vec![url];
        }
        if let Some(dim) = get("EMBEDDING_DIMENSIONALITY") {
            match dim.trim().parse() {
                Ok(dim) => self.embedding.dimensionality = dim,
                Err(_) => tracing::warn!(value = %dim, "Ignoring invalid EMBEDDING_DIMENSIONALITY"),
            }
        }
        if let Some(model) = get("MODEL_HANDLE") {
            self.embedding.dense_model = model;
        }
        if let Some(model) = get("SPARSE_MODEL_HANDLE") {
            self.embedding.sparse_model = model;
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(model) = get("LLM_MODEL") {
            self.llm.model = model;
        }
    }

    /// Resolved dense vector name; `None` is the collection's unnamed vector
    pub fn dense_vector(&self) -> Option<String> {
        match self.embedding.dense_vector.as_deref().map(str::trim) {
            Some("") => None,
            Some(name) => Some(name.to_string()),
            None => match self.store.layout {
                LayoutKind::Dense => None,
                LayoutKind::Sparse | LayoutKind::Hybrid => Some(DEFAULT_DENSE_VECTOR.to_string()),
            },
        }
    }

    pub fn dense_config(&self) -> DenseConfig {
        DenseConfig {
            vector_name: self.dense_vector(),
            size: self.embedding.dimensionality,
            distance: self.embedding.distance,
            model: self.embedding.dense_model.clone(),
        }
    }

    pub fn sparse_config(&self) -> SparseConfig {
        SparseConfig {
            vector_name: self.embedding.sparse_vector.clone(),
            modifier: SparseModifier::Idf,
            model: self.embedding.sparse_model.clone(),
        }
    }

    /// Collection to provision and index into
    pub fn collection_spec(&self) -> CollectionSpec {
        let layout = match self.store.layout {
            LayoutKind::Dense => CollectionLayout::Dense(self.dense_config()),
            LayoutKind::Sparse => CollectionLayout::Sparse(self.sparse_config()),
            LayoutKind::Hybrid => CollectionLayout::Hybrid {
                dense: self.dense_config(),
                sparse: self.sparse_config(),
            },
        };

        CollectionSpec {
            name: self.store.collection.clone(),
            layout,
        }
    }

    pub fn retrieval_config(&self) -> RetrievalConfig {
        RetrievalConfig {
            strategy: self.retrieval.strategy,
            collection: self.store.collection.clone(),
            dense_vector: self.dense_vector(),
            dense_model: self.embedding.dense_model.clone(),
            sparse_vector: self.embedding.sparse_vector.clone(),
            sparse_model: self.embedding.sparse_model.clone(),
            limit: self.retrieval.limit,
        }
    }

    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            limit: self.retrieval.limit,
            course: self.retrieval.course.clone(),
        }
    }

    pub fn context_config(&self) -> ContextConfig {
        ContextConfig {
            include_question: self.retrieval.include_question,
        }
    }

    pub fn sources(&self) -> Result<Vec<SourceLocator>> {
        self.documents.sources.iter().map(|s| s.parse()).collect()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.llm.request_timeout_secs)
    }
}
