//! Answer generation
//!
//! [`ChatModel`] is the seam to the language model; [`OpenAIClient`] is the
//! HTTP implementation. [`AnswerGenerator`] renders the course-assistant
//! prompt and sends it as a single user message.

pub mod client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::rag::context::AssembledContext;
use crate::rag::prompt::PromptTemplate;

pub use client::OpenAIClient;

/// Chat message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A chat completion backend
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate the assistant reply to `messages`
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Turns a question plus assembled context into an answer
pub struct AnswerGenerator<M: ChatModel> {
    model: M,
    template: PromptTemplate,
}

impl<M: ChatModel> AnswerGenerator<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            template: PromptTemplate::default(),
        }
    }

    pub fn with_template(model: M, template: PromptTemplate) -> Self {
        Self { model, template }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Render the prompt without calling the model
    pub fn prompt(&self, question: &str, context: &AssembledContext) -> String {
        self.template.render(question, context)
    }

    pub async fn answer(&self, question: &str, context: &AssembledContext) -> Result<String> {
        let prompt = self.prompt(question, context);
        tracing::debug!(
            prompt_chars = prompt.len(),
            empty_context = context.is_empty(),
            "Requesting answer"
        );

        self.model.complete(&[ChatMessage::user(prompt)]).await
    }
}
