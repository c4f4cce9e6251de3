//! Text generation backend with per-conversation history
//!
//! Replies are canned, but the adapter keeps the full multi-turn bookkeeping:
//! the system prompt opens a conversation, and every exchange records the
//! user turn and the assistant reply in the shared [`ConversationStore`].

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::backend::canned::{elapsed_ms, AdapterCore};
use crate::backend::conversation::{ChatMessage, ConversationStore, Role, DEFAULT_CONVERSATION_ID};
use crate::backend::rate_limiter::FixedWindowRateLimiter;
use crate::backend::traits::AiService;
use crate::backend::types::{Request, RequestPayload, Response, ResponsePayload, ServiceKind};
use crate::config::ServiceConfig;
use crate::error::{AppError, Result};

/// Canned text generation backend
pub struct TextGenerationService {
    core: AdapterCore,
    conversations: Arc<ConversationStore>,
}

impl TextGenerationService {
    pub fn new(
        config: ServiceConfig,
        limiter: Arc<FixedWindowRateLimiter>,
        conversations: Arc<ConversationStore>,
    ) -> Self {
        Self {
            core: AdapterCore::new(config, limiter),
            conversations,
        }
    }

    /// History for a conversation, `None` meaning the default one
    pub fn history(&self, conversation_id: Option<&str>) -> Vec<ChatMessage> {
        self.conversations
            .history(conversation_id.unwrap_or(DEFAULT_CONVERSATION_ID))
    }

    fn compose_reply(&self, prompt: &str, history: &[ChatMessage]) -> String {
        let model = self.core.config().model.as_deref().unwrap_or("canned");
        let previous_user_turns = history.iter().filter(|m| m.role == Role::User).count();

        let persona = history
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| format!(" as {}", m.content.trim_end_matches('.')))
            .unwrap_or_default();

        if previous_user_turns == 0 {
            format!("[{}] Answering{}: {}", model, persona, summarize(prompt))
        } else {
            format!(
                "[{}] Following up on our {} earlier messages{}: {}",
                model,
                previous_user_turns,
                persona,
                summarize(prompt)
            )
        }
    }
}

fn summarize(prompt: &str) -> String {
    const MAX_WORDS: usize = 12;
    let words: Vec<&str> = prompt.split_whitespace().collect();
    if words.len() <= MAX_WORDS {
        words.join(" ")
    } else {
        format!("{}...", words[..MAX_WORDS].join(" "))
    }
}

#[async_trait]
impl AiService for TextGenerationService {
    fn kind(&self) -> ServiceKind {
        ServiceKind::TextGeneration
    }

    fn name(&self) -> &str {
        self.core.name()
    }

    fn is_available(&self) -> bool {
        self.core.is_available()
    }

    async fn initialize(&self) -> Result<()> {
        self.core.initialize().await
    }

    async fn process(&self, request: &Request) -> Result<Response> {
        let started = self.core.begin_request(request).await?;

        let (prompt, conversation_id, system_prompt) = match &request.payload {
            RequestPayload::TextGeneration {
                prompt,
                conversation_id,
                system_prompt,
            } => (
                prompt,
                conversation_id.as_deref().unwrap_or(DEFAULT_CONVERSATION_ID),
                system_prompt.as_deref(),
            ),
            other => {
                return Err(AppError::InvalidRequest(format!(
                    "text backend cannot handle {} payloads",
                    other.service_kind()
                )))
            }
        };

        if prompt.trim().is_empty() {
            return Ok(Response::failure(request.id, "prompt is empty", elapsed_ms(started)));
        }

        let (reply, turns) = self.conversations.record_exchange(
            conversation_id,
            system_prompt,
            prompt,
            |history| self.compose_reply(prompt, history),
        );

        debug!(conversation_id = %conversation_id, turns, "Generated reply");

        Ok(Response::success(
            request.id,
            ResponsePayload::GeneratedText {
                text: reply,
                conversation_id: conversation_id.to_string(),
                turns,
            },
            elapsed_ms(started),
        ))
    }

    async fn prewarm(&self) -> Result<()> {
        self.core.prewarm().await
    }

    async fn shutdown(&self) {
        self.core.shutdown();
    }
}
