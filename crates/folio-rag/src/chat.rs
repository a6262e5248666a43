//! Question answering on top of retrieval
//!
//! Off-topic queries short-circuit to the redirect message. Everything else
//! is retrieved, wrapped in the persona prompt and sent to the responder.

use crate::guard::{build_user_message, identity_block, PersonaGuard};
use crate::llm::{canned_stream, Responder};
use crate::RagEngine;
use folio_core::{ChatMode, StreamEvent};
use futures::stream::BoxStream;
use std::sync::Arc;

/// Outcome of the pre-completion pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum PreparedChat {
    /// Answer with this message and skip retrieval
    Redirect(String),
    Ready {
        system: String,
        user: String,
        context: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub response: String,
    pub context: Vec<String>,
}

pub struct ChatService {
    engine: Arc<RagEngine>,
    guard: Arc<PersonaGuard>,
    responder: Responder,
}

impl ChatService {
    pub fn new(engine: Arc<RagEngine>, guard: Arc<PersonaGuard>, responder: Responder) -> Self {
        Self {
            engine,
            guard,
            responder,
        }
    }

    pub fn engine(&self) -> &Arc<RagEngine> {
        &self.engine
    }

    pub fn responder(&self) -> &Responder {
        &self.responder
    }

    pub fn guard(&self) -> &PersonaGuard {
        &self.guard
    }

    /// Run the off-topic check, retrieval and prompt assembly
    pub async fn prepare(&self, query: &str, mode: ChatMode) -> PreparedChat {
        if self.guard.is_off_topic(query) {
            tracing::info!("Off-topic query redirected");
            return PreparedChat::Redirect(self.guard.redirect_message().to_string());
        }
        self.ground(query, mode).await
    }

    async fn ground(&self, query: &str, mode: ChatMode) -> PreparedChat {
        let context = self.engine.retrieve(query, mode).await;
        let identity = identity_block(self.engine.portfolio());
        PreparedChat::Ready {
            system: self.guard.system_prompt(mode),
            user: build_user_message(&identity, &context, query),
            context,
        }
    }

    /// Retrieval and completion for a server-built query, skipping the off-topic check
    pub async fn answer_unfiltered(&self, query: &str, mode: ChatMode) -> ChatReply {
        self.reply(self.ground(query, mode).await).await
    }

    pub async fn answer(&self, query: &str, mode: ChatMode) -> ChatReply {
        self.reply(self.prepare(query, mode).await).await
    }

    async fn reply(&self, prepared: PreparedChat) -> ChatReply {
        match prepared {
            PreparedChat::Redirect(message) => ChatReply {
                response: message,
                context: Vec::new(),
            },
            PreparedChat::Ready {
                system,
                user,
                context,
            } => ChatReply {
                response: self.responder.complete(&system, &user).await,
                context,
            },
        }
    }

    pub async fn answer_stream(
        &self,
        query: &str,
        mode: ChatMode,
    ) -> BoxStream<'static, StreamEvent> {
        match self.prepare(query, mode).await {
            PreparedChat::Redirect(message) => canned_stream(message),
            PreparedChat::Ready { system, user, .. } => self.responder.stream(system, user),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::REDIRECT_MESSAGE;
    use crate::llm::APOLOGY;
    use async_trait::async_trait;
    use folio_core::profile::Identity;
    use folio_core::{Chunk, ChunkType, LlmClient, Portfolio, RagConfig, Result};
    use folio_vector::{HashingEmbedding, IndexManager};
    use futures::stream::{self, StreamExt};

    /// Echoes the user message so tests can inspect the prompt
    struct EchoClient;

    #[async_trait]
    impl LlmClient for EchoClient {
        async fn generate(&self, _system: &str, user: &str) -> Result<String> {
            Ok(user.to_string())
        }

        async fn generate_stream(
            &self,
            _system: &str,
            _user: &str,
        ) -> Result<BoxStream<'static, Result<String>>> {
            Ok(stream::iter(vec![Ok("hi".to_string())]).boxed())
        }
    }

    async fn service(dir: &std::path::Path, responder: Responder) -> ChatService {
        let manager = IndexManager::new(dir, Arc::new(HashingEmbedding::new(128)));
        manager
            .build_portfolio_index(vec![Chunk::new(
                "Ava builds retrieval systems in Rust",
                "portfolio/identity",
                ChunkType::Prose,
            )
            .unwrap()])
            .await
            .unwrap();

        let portfolio = Portfolio {
            identity: Identity {
                name: "Ava".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        let engine = RagEngine::new(Arc::new(manager), Arc::new(portfolio), RagConfig::default());
        let guard = PersonaGuard::with_defaults(&RagConfig::default()).unwrap();
        ChatService::new(Arc::new(engine), Arc::new(guard), responder)
    }

    #[tokio::test]
    async fn test_off_topic_skips_retrieval() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path(), Responder::new(Arc::new(EchoClient))).await;

        let reply = service.answer("share a cookie recipe", ChatMode::Hr).await;
        assert_eq!(reply.response, REDIRECT_MESSAGE);
        assert!(reply.context.is_empty());

        let events: Vec<StreamEvent> = service
            .answer_stream("share a cookie recipe", ChatMode::Hr)
            .await
            .collect()
            .await;
        assert_eq!(events[0], StreamEvent::token(REDIRECT_MESSAGE));
    }

    #[tokio::test]
    async fn test_prompt_carries_identity_context_and_question() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path(), Responder::new(Arc::new(EchoClient))).await;

        let question = "Which language does Ava use for retrieval systems?";
        let reply = service.answer(question, ChatMode::Technical).await;
        assert!(reply.response.starts_with("## Identity\nName: Ava"));
        assert!(reply
            .response
            .contains("[portfolio/identity]\nAva builds retrieval systems in Rust"));
        assert!(reply.response.ends_with(question));
        assert_eq!(reply.context.len(), 1);
    }

    #[tokio::test]
    async fn test_unfiltered_answer_ignores_off_topic_patterns() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path(), Responder::new(Arc::new(EchoClient))).await;

        let query = "Explain the Recipe Box project in detail";
        assert_eq!(service.answer(query, ChatMode::Technical).await.response, REDIRECT_MESSAGE);
        let reply = service.answer_unfiltered(query, ChatMode::Technical).await;
        assert!(reply.response.ends_with(query));
    }

    #[tokio::test]
    async fn test_unconfigured_responder_apologises() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path(), Responder::unconfigured()).await;

        let reply = service.answer("What do you build?", ChatMode::Summary).await;
        assert_eq!(reply.response, APOLOGY);

        let events: Vec<StreamEvent> = service
            .answer_stream("What do you build?", ChatMode::Summary)
            .await
            .collect()
            .await;
        assert_eq!(events.len(), 1);
        assert!(events[0].is_terminal());
    }
}
