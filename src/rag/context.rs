// Context builder for RAG prompts
use serde::{Deserialize, Serialize};

use crate::rag::retrieval::{RetrievalResult, ScoredMatch};

/// Context assembly configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Include each match's question line between section and answer
    #[serde(default)]
    pub include_question: bool,
}

/// Assembled context for prompt augmentation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssembledContext {
    /// The formatted context text; empty when nothing was retrieved
    pub text: String,
    /// Course label shown in the header
    pub course: Option<String>,
    /// Number of matches included
    pub match_count: usize,
    /// Matches came from more than one course
    pub mixed_courses: bool,
}

impl AssembledContext {
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            course: None,
            match_count: 0,
            mixed_courses: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.match_count == 0
    }
}

/// Context builder for assembling RAG context
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    config: ContextConfig,
}

impl ContextBuilder {
    /// Create new context builder with default config
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom configuration
    pub fn with_config(config: ContextConfig) -> Self {
        Self { config }
    }

    /// Build context from a retrieval result, keeping its order.
    ///
    /// The header names a single course: the first match's. When matches
    /// span several courses the header is still the first one's and
    /// `mixed_courses` is set.
    pub fn build(&self, result: &RetrievalResult) -> AssembledContext {
        let first = match result.matches.first() {
            Some(first) => first,
            None => return AssembledContext::empty(),
        };

        let course = first.document.course.clone();
        let mixed_courses = result
            .matches
            .iter()
            .any(|m| m.document.course != course);
        if mixed_courses {
            tracing::warn!(
                course = %course,
                "Retrieved matches span several courses; labelling context with the first"
            );
        }

        let mut text = format!("Course: {}\n\n", course);
        for m in &result.matches {
            text.push_str(&self.format_match(m));
        }

        AssembledContext {
            text,
            course: Some(course),
            match_count: result.len(),
            mixed_courses,
        }
    }

    /// Format a single match
    fn format_match(&self, m: &ScoredMatch) -> String {
        let doc = &m.document;
        if self.config.include_question {
            format!(
                "Section: {}\nquestion: {}\nanswer: {}\n\n",
                doc.section, doc.question, doc.text
            )
        } else {
            format!("Section: {}\nanswer: {}\n\n", doc.section, doc.text)
        }
    }

    /// Get current configuration
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Update configuration
    pub fn set_config(&mut self, config: ContextConfig) {
        self.config = config;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::retrieval::StrategyKind;
    use crate::Document;

    fn scored(course: &str, section: &str, text: &str, rank: usize) -> ScoredMatch {
        ScoredMatch {
            document: Document {
                course: course.to_string(),
                section: section.to_string(),
                question: format!("question {}", rank),
                text: text.to_string(),
            },
            score: 1.0 / rank as f32,
            rank,
        }
    }

    fn result(matches: Vec<ScoredMatch>) -> RetrievalResult {
        RetrievalResult {
            strategy: StrategyKind::Dense,
            matches,
        }
    }

    #[test]
    fn test_build_empty_result() {
        let context = ContextBuilder::new().build(&result(vec![]));
        assert_eq!(context.text, "");
        assert!(context.course.is_none());
        assert!(context.is_empty());
        assert!(!context.mixed_courses);
    }

    #[test]
    fn test_build_exact_format() {
        let context = ContextBuilder::new().build(&result(vec![
            scored("data-engineering-zoomcamp", "General course-related questions", "In January", 1),
            scored("data-engineering-zoomcamp", "Module 1", "Install Docker", 2),
        ]));

        assert_eq!(
            context.text,
            "Course: data-engineering-zoomcamp\n\n\
             Section: General course-related questions\nanswer: In January\n\n\
             Section: Module 1\nanswer: Install Docker\n\n"
        );
        assert_eq!(context.course.as_deref(), Some("data-engineering-zoomcamp"));
        assert_eq!(context.match_count, 2);
        assert!(!context.mixed_courses);
    }

    #[test]
    fn test_build_with_question_lines() {
        let builder = ContextBuilder::with_config(ContextConfig {
            include_question: true,
        });
        assert!(builder.config().include_question);

        let context = builder.build(&result(vec![scored("llm-zoomcamp", "General", "Yes", 1)]));
        assert_eq!(
            context.text,
            "Course: llm-zoomcamp\n\nSection: General\nquestion: question 1\nanswer: Yes\n\n"
        );
    }

    #[test]
    fn test_mixed_courses_use_first_label() {
        let context = ContextBuilder::new().build(&result(vec![
            scored("mlops-zoomcamp", "A", "one", 1),
            scored("llm-zoomcamp", "B", "two", 2),
        ]));

        assert!(context.text.starts_with("Course: mlops-zoomcamp\n\n"));
        assert_eq!(context.text.matches("Course:").count(), 1);
        assert!(context.mixed_courses);
    }

    #[test]
    fn test_every_match_appears_in_order() {
        let matches: Vec<_> = (1..=5)
            .map(|i| scored("llm-zoomcamp", &format!("S{}", i), &format!("T{}", i), i))
            .collect();
        let context = ContextBuilder::new().build(&result(matches));

        let positions: Vec<usize> = (1..=5)
            .map(|i| context.text.find(&format!("Section: S{}\nanswer: T{}", i, i)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }
}
