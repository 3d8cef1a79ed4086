// End-to-end RAG pipeline
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::llm::{AnswerGenerator, ChatModel};
use crate::rag::context::{AssembledContext, ContextBuilder};
use crate::rag::retrieval::{RetrievalEngine, RetrievalResult, SearchParams};

/// RAG pipeline result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagAnswer {
    /// Original question
    pub question: String,
    /// Model answer
    pub answer: String,
    /// Context the answer was grounded on
    pub context: AssembledContext,
    /// Retrieved matches
    pub result: RetrievalResult,
}

/// Retrieve, assemble context, generate
pub struct RagPipeline<M: ChatModel> {
    retrieval_engine: RetrievalEngine,
    context_builder: ContextBuilder,
    generator: AnswerGenerator<M>,
}

impl<M: ChatModel> RagPipeline<M> {
    pub fn new(
        retrieval_engine: RetrievalEngine,
        context_builder: ContextBuilder,
        generator: AnswerGenerator<M>,
    ) -> Self {
        Self {
            retrieval_engine,
            context_builder,
            generator,
        }
    }

    /// Retrieval only, with the engine's default parameters overridden by `params`
    pub async fn retrieve(&self, question: &str, params: &SearchParams) -> Result<RetrievalResult> {
        self.retrieval_engine
            .retrieve_with_params(question, params)
            .await
    }

    /// Execute the pipeline: retrieve -> build context -> answer
    pub async fn answer(&self, question: &str, params: &SearchParams) -> Result<RagAnswer> {
        let result = self.retrieve(question, params).await?;
        let context = self.context_builder.build(&result);

        if context.is_empty() {
            tracing::info!("No matches found; answering without course context");
        }

        let answer = self.generator.answer(question, &context).await?;

        Ok(RagAnswer {
            question: question.to_string(),
            answer,
            context,
            result,
        })
    }

    /// Execute with the engine's default parameters
    pub async fn ask(&self, question: &str) -> Result<RagAnswer> {
        let params = self.retrieval_engine.default_params().clone();
        self.answer(question, &params).await
    }

    pub fn retrieval_engine(&self) -> &RetrievalEngine {
        &self.retrieval_engine
    }

    /// Render the prompt that would be sent for `question`
    pub fn prompt(&self, question: &str, context: &AssembledContext) -> String {
        self.generator.prompt(question, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RagError;
    use crate::llm::ChatMessage;
    use crate::rag::retrieval::{Query, RetrievalStrategy, ScoredMatch, StrategyKind};
    use crate::Document;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct FixedStrategy {
        matches: Vec<ScoredMatch>,
    }

    #[async_trait]
    impl RetrievalStrategy for FixedStrategy {
        async fn search(&self, query: &Query) -> Result<RetrievalResult> {
            query.validate()?;
            Ok(RetrievalResult {
                strategy: StrategyKind::Dense,
                matches: self.matches.iter().take(query.limit).cloned().collect(),
            })
        }

        fn kind(&self) -> StrategyKind {
            StrategyKind::Dense
        }
    }

    #[derive(Default)]
    struct EchoModel {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatModel for EchoModel {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
            self.prompts.lock().unwrap().push(messages[0].content.clone());
            Ok("answer".to_string())
        }
    }

    fn pipeline(matches: Vec<ScoredMatch>) -> RagPipeline<EchoModel> {
        RagPipeline::new(
            RetrievalEngine::new(Arc::new(FixedStrategy { matches })),
            ContextBuilder::new(),
            AnswerGenerator::new(EchoModel::default()),
        )
    }

    fn scored(text: &str, rank: usize) -> ScoredMatch {
        ScoredMatch {
            document: Document {
                course: "llm-zoomcamp".to_string(),
                section: "General".to_string(),
                question: String::new(),
                text: text.to_string(),
            },
            score: 1.0,
            rank,
        }
    }

    #[tokio::test]
    async fn test_answer_includes_context() {
        let pipeline = pipeline(vec![scored("Starts in June", 1)]);
        let answer = pipeline.ask("When?").await.unwrap();

        assert_eq!(answer.answer, "answer");
        assert_eq!(answer.question, "When?");
        assert_eq!(answer.context.match_count, 1);
        assert_eq!(answer.result.len(), 1);

        let prompts = pipeline.generator_prompts();
        assert!(prompts[0].contains("answer: Starts in June"));
    }

    #[tokio::test]
    async fn test_empty_retrieval_still_answers() {
        let pipeline = pipeline(vec![]);
        let answer = pipeline.ask("Anything?").await.unwrap();
        assert!(answer.context.is_empty());
        assert_eq!(answer.answer, "answer");
    }

    #[tokio::test]
    async fn test_invalid_query_stops_pipeline() {
        let pipeline = pipeline(vec![scored("x", 1)]);
        let err = pipeline
            .answer("q", &SearchParams { limit: 0, course: None })
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::InvalidQuery(_)));
        assert!(pipeline.generator_prompts().is_empty());
    }

    impl RagPipeline<EchoModel> {
        fn generator_prompts(&self) -> Vec<String> {
            self.generator.model().prompts.lock().unwrap().clone()
        }
    }
}
