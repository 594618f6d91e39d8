//! OpenAI ⇄ Ollama dialect translation.
//!
//! Chat transcripts are flattened into a single `/api/generate` prompt, and
//! generated text is wrapped back into OpenAI completion objects with
//! synthesized token usage.

use std::time::{SystemTime, UNIX_EPOCH};

use relaylm_core::TokenUsage;
use uuid::Uuid;

use crate::models::{
    AssistantMessage, ChatChoice, ChatChunkChoice, ChatCompletionChunk, ChatCompletionResponse,
    ChatDelta, ChatMessage, Usage,
};
use crate::ollama_models::{GenerateRequest, GenerateResponse};

/// Flatten a chat transcript into a prompt: `"{role}: {content}\n"` per message.
pub fn flatten_prompt(messages: &[ChatMessage]) -> String {
    messages.iter().fold(String::new(), |mut prompt, message| {
        prompt.push_str(&message.role);
        prompt.push_str(": ");
        prompt.push_str(&message.content);
        prompt.push('\n');
        prompt
    })
}

/// Build the backend request for a chat transcript.
pub fn generation_request(model: &str, messages: &[ChatMessage], stream: bool) -> GenerateRequest {
    GenerateRequest {
        model: model.to_string(),
        prompt: flatten_prompt(messages),
        stream,
    }
}

/// Fresh `chatcmpl-` id with 12 hex characters.
pub fn completion_id() -> String {
    format!("chatcmpl-{}", &Uuid::new_v4().simple().to_string()[..12])
}

fn system_fingerprint() -> String {
    format!("fp_{}", &Uuid::new_v4().simple().to_string()[..8])
}

/// Current Unix time in seconds.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}

/// Identity shared by every chunk of one streamed completion.
///
/// Fixed once at request start so `id` and `created` never drift across
/// chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionMeta {
    pub id: String,
    pub created: i64,
    /// Model name echoed back to the caller (the one it asked for).
    pub model: String,
}

impl CompletionMeta {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            id: completion_id(),
            created: unix_now(),
            model: model.into(),
        }
    }

    fn chunk(
        &self,
        delta: ChatDelta,
        finish_reason: Option<&str>,
        usage: Option<Usage>,
    ) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChatChunkChoice {
                index: 0,
                delta,
                finish_reason: finish_reason.map(str::to_string),
            }],
            usage,
        }
    }

    /// First chunk of every stream: announces the assistant role.
    pub fn role_chunk(&self) -> ChatCompletionChunk {
        self.chunk(
            ChatDelta {
                role: Some("assistant".to_string()),
                content: None,
            },
            None,
            None,
        )
    }

    pub fn content_chunk(&self, text: impl Into<String>) -> ChatCompletionChunk {
        self.chunk(
            ChatDelta {
                role: None,
                content: Some(text.into()),
            },
            None,
            None,
        )
    }

    pub fn stop_chunk(&self) -> ChatCompletionChunk {
        self.chunk(ChatDelta::default(), Some("stop"), None)
    }

    pub fn usage_chunk(&self, usage: TokenUsage) -> ChatCompletionChunk {
        self.chunk(ChatDelta::default(), None, Some(usage.into()))
    }
}

/// Wrap a non-streaming backend answer into an OpenAI completion.
///
/// `model` is the caller's requested name, not a substituted one.
pub fn completion_response(
    model: &str,
    prompt: &str,
    backend: &GenerateResponse,
) -> ChatCompletionResponse {
    let usage = TokenUsage::estimate(prompt, &backend.response);

    ChatCompletionResponse {
        id: completion_id(),
        object: "chat.completion".to_string(),
        created: unix_now(),
        model: model.to_string(),
        choices: vec![ChatChoice {
            index: 0,
            message: AssistantMessage {
                role: "assistant".to_string(),
                content: backend.response.clone(),
                refusal: None,
                annotations: Vec::new(),
            },
            logprobs: None,
            finish_reason: "stop".to_string(),
        }],
        usage: usage.into(),
        service_tier: "default".to_string(),
        system_fingerprint: system_fingerprint(),
    }
}
