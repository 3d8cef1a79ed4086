//! Course documents: the FAQ entries that get indexed and retrieved.
//!
//! Components:
//! - Loader: reads per-course JSON groups from files or URLs and flattens them
//! - Indexer: turns documents into store points and upserts them

pub mod loader;
pub mod indexer;

use serde::{Deserialize, Serialize};

pub use indexer::{DocumentIndexer, IdScheme, IndexReport};
pub use loader::{DocumentLoader, SourceLocator};

/// A single course FAQ entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub course: String,
    pub section: String,
    #[serde(default)]
    pub question: String,
    pub text: String,
}

/// Raw entry inside a course group (course not yet attached)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDocument {
    pub text: String,
    pub section: String,
    #[serde(default)]
    pub question: String,
}

/// One course and its documents, as published in the source JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseGroup {
    pub course: String,
    pub documents: Vec<RawDocument>,
}

impl CourseGroup {
    /// Stamp every document in the group with the group's course
    pub fn into_documents(self) -> impl Iterator<Item = Document> {
        let course = self.course;
        self.documents.into_iter().map(move |raw| Document {
            course: course.clone(),
            section: raw.section,
            question: raw.question,
            text: raw.text,
        })
    }
}
