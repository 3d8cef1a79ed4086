//! CourseBuddy - course FAQ question answering
//!
//! Retrieval-augmented generation over DataTalksClub course FAQ documents.
//!
//! # Architecture
//!
//! - **documents**: load per-course JSON and index it as store points
//! - **store**: collection-oriented search store (Qdrant or in-process)
//! - **rag**: retrieval strategies, rank fusion, context assembly, pipeline
//! - **llm**: chat-completion client and answer generation
//! - **config / cli / telemetry**: the ambient plumbing for the binary

pub mod errors;
pub mod config;
pub mod telemetry;
pub mod cli;

pub mod documents;
pub mod store;
pub mod rag;
pub mod llm;

// Re-export commonly used types
pub use config::Config;
pub use documents::Document;
pub use errors::{RagError, Result};
