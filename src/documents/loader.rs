//! Document loader for course FAQ JSON
//!
//! Sources are JSON arrays of `{course, documents: [...]}` groups, either on
//! disk or behind an HTTP GET. Loading flattens all groups of all sources into
//! one ordered sequence, each document stamped with its course.

use reqwest::Client;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::documents::{CourseGroup, Document};
use crate::errors::{RagError, Result};

/// Where a document source lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocator {
    File(PathBuf),
    Url(String),
}

impl FromStr for SourceLocator {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(RagError::Config("Empty document source".to_string()));
        }

        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Ok(SourceLocator::Url(trimmed.to_string()))
        } else {
            Ok(SourceLocator::File(PathBuf::from(trimmed)))
        }
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocator::File(path) => write!(f, "{}", path.display()),
            SourceLocator::Url(url) => write!(f, "{}", url),
        }
    }
}

/// Loads and flattens course documents
#[derive(Debug, Clone)]
pub struct DocumentLoader {
    client: Client,
}

impl DocumentLoader {
    /// Create a loader whose HTTP fetches time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RagError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Load every source in order and concatenate their documents
    pub async fn load(&self, sources: &[SourceLocator]) -> Result<Vec<Document>> {
        let mut documents = Vec::new();

        for source in sources {
            let loaded = self.load_source(source).await?;
            tracing::info!(source = %source, documents = loaded.len(), "Loaded document source");
            documents.extend(loaded);
        }

        Ok(documents)
    }

    /// Load a single source
    pub async fn load_source(&self, source: &SourceLocator) -> Result<Vec<Document>> {
        let name = source.to_string();
        let body = match source {
            SourceLocator::File(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(|e| RagError::source_unavailable(&name, e))?,
            SourceLocator::Url(url) => self.fetch(url).await?,
        };

        Self::parse(&name, &body)
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        tracing::debug!(url, "Fetching documents");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RagError::source_unavailable(url, e))?;

        if !response.status().is_success() {
            return Err(RagError::source_unavailable(
                url,
                format!("HTTP {}", response.status()),
            ));
        }

        response
            .text()
            .await
            .map_err(|e| RagError::source_unavailable(url, e))
    }

    /// Parse a JSON body of course groups into flat documents
    pub fn parse(source_name: &str, body: &str) -> Result<Vec<Document>> {
        let groups: Vec<CourseGroup> =
            serde_json::from_str(body).map_err(|e| RagError::malformed(source_name, e))?;

        Ok(groups
            .into_iter()
            .flat_map(CourseGroup::into_documents)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answer one GET with a canned response; returns the URL to fetch
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        format!("http://{}/documents.json", addr)
    }

    const SAMPLE: &str = r#"[
        {"course": "data-engineering-zoomcamp", "documents": [
            {"text": "The course starts on 15th Jan.", "section": "General course-related questions", "question": "Course - When will the course start?"},
            {"text": "Yes, you can still join.", "section": "General course-related questions", "question": "Course - Can I still join the course after the start date?"}
        ]},
        {"course": "mlops-zoomcamp", "documents": [
            {"text": "Use MLflow.", "section": "Module 2", "question": "Which tracking tool?"}
        ]}
    ]"#;

    #[test]
    fn test_locator_from_str() {
        assert_eq!(
            "https://example.com/documents.json".parse::<SourceLocator>().unwrap(),
            SourceLocator::Url("https://example.com/documents.json".to_string())
        );
        assert_eq!(
            "../01-intro/documents.json".parse::<SourceLocator>().unwrap(),
            SourceLocator::File(PathBuf::from("../01-intro/documents.json"))
        );
        assert!("  ".parse::<SourceLocator>().is_err());
    }

    #[test]
    fn test_parse_flattens_and_stamps_course() {
        let docs = DocumentLoader::parse("sample", SAMPLE).unwrap();
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0].course, "data-engineering-zoomcamp");
        assert_eq!(docs[1].course, "data-engineering-zoomcamp");
        assert_eq!(docs[2].course, "mlops-zoomcamp");
        assert_eq!(docs[2].question, "Which tracking tool?");
    }

    #[test]
    fn test_parse_rejects_wrong_shape() {
        let err = DocumentLoader::parse("bad", r#"{"course": "x"}"#).unwrap_err();
        assert!(matches!(err, RagError::MalformedData { .. }));

        let err = DocumentLoader::parse("bad", r#"[{"course": "x"}]"#).unwrap_err();
        assert!(matches!(err, RagError::MalformedData { .. }));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let loader = DocumentLoader::new(Duration::from_secs(5)).unwrap();
        let missing = SourceLocator::File(PathBuf::from("/definitely/not/here.json"));
        let err = loader.load(&[missing]).await.unwrap_err();
        assert!(matches!(err, RagError::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_load_url() {
        let url = serve_once("200 OK", SAMPLE).await;
        let loader = DocumentLoader::new(Duration::from_secs(5)).unwrap();
        let docs = loader.load(&[url.parse::<SourceLocator>().unwrap()]).await.unwrap();
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[2].course, "mlops-zoomcamp");
    }

    #[tokio::test]
    async fn test_url_error_status_is_unavailable() {
        let url = serve_once("404 Not Found", "not here").await;
        let loader = DocumentLoader::new(Duration::from_secs(5)).unwrap();
        let err = loader.load(&[SourceLocator::Url(url)]).await.unwrap_err();
        match err {
            RagError::SourceUnavailable { reason, .. } => assert!(reason.contains("404")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_url_wrong_shape_is_malformed() {
        let url = serve_once("200 OK", r#"{"documents": []}"#).await;
        let loader = DocumentLoader::new(Duration::from_secs(5)).unwrap();
        let err = loader.load(&[SourceLocator::Url(url)]).await.unwrap_err();
        assert!(matches!(err, RagError::MalformedData { .. }));
    }

    #[tokio::test]
    async fn test_load_multiple_files_in_order() {
        let mut first = NamedTempFile::new().unwrap();
        first.write_all(SAMPLE.as_bytes()).unwrap();

        let mut second = NamedTempFile::new().unwrap();
        let llm = json!([{"course": "llm-zoomcamp", "documents": [
            {"text": "Yes", "section": "General", "question": "Is it free?"}
        ]}]);
        second.write_all(llm.to_string().as_bytes()).unwrap();

        let loader = DocumentLoader::new(Duration::from_secs(5)).unwrap();
        let docs = loader
            .load(&[
                SourceLocator::File(first.path().to_path_buf()),
                SourceLocator::File(second.path().to_path_buf()),
            ])
            .await
            .unwrap();

        assert_eq!(docs.len(), 4);
        assert_eq!(docs[3].course, "llm-zoomcamp");
    }

    #[quickcheck]
    fn prop_loaded_count_matches_groups(sizes: Vec<u8>) -> bool {
        let groups: Vec<serde_json::Value> = sizes
            .iter()
            .enumerate()
            .map(|(g, size)| {
                let docs: Vec<serde_json::Value> = (0..(*size % 8))
                    .map(|i| json!({"text": format!("t{}", i), "section": "s", "question": "q"}))
                    .collect();
                json!({"course": format!("course-{}", g), "documents": docs})
            })
            .collect();
        let body = serde_json::Value::Array(groups).to_string();

        let docs = DocumentLoader::parse("generated", &body).unwrap();
        let expected: usize = sizes.iter().map(|s| (*s % 8) as usize).sum();

        let mut offset = 0;
        for (g, size) in sizes.iter().enumerate() {
            let n = (*size % 8) as usize;
            let course = format!("course-{}", g);
            if !docs[offset..offset + n].iter().all(|d| d.course == course) {
                return false;
            }
            offset += n;
        }

        docs.len() == expected
    }
}
