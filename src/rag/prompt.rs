// Course-assistant prompt template
use serde::{Deserialize, Serialize};

use crate::rag::context::AssembledContext;

const DEFAULT_TEMPLATE: &str = "You are a course assistant, and your goal is to answer questions of students, \
where QUESTION is provided below and CONTEXT is provided most of the times.
Rules:
* Answer the QUESTION based on the CONTEXT.
* Use only the facts from the CONTEXT.
* If CONTEXT is empty, please let the student know, the information about their query is not there, \
however you found the following information on the web, by searching the web

QUESTION: {question}

CONTEXT: {context}";

/// Shown in place of an empty context
pub const EMPTY_CONTEXT: &str = "(empty: no information was found in the course documents)";

/// Prompt template with `{question}` and `{context}` placeholders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn render(&self, question: &str, context: &AssembledContext) -> String {
        let context_text = if context.text.trim().is_empty() {
            EMPTY_CONTEXT
        } else {
            context.text.trim_end()
        };

        self.template
            .replace("{question}", question)
            .replace("{context}", context_text)
    }
}
