//! NDJSON → OpenAI SSE streaming adapter for chat completions.
//!
//! Ollama streams one JSON object per line with a `response` fragment,
//! while OpenAI clients expect `chat.completion.chunk` objects framed as
//! Server-Sent Events. This module translates between the two on the fly.
//!
//! Frame order for a stream that ends naturally:
//!
//! 1. role chunk (`delta: {role: "assistant"}`)
//! 2. one content chunk per backend line carrying `response`, even an empty one
//! 3. stop chunk (`finish_reason: "stop"`)
//! 4. usage chunk
//! 5. `[DONE]`

use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use relaylm_core::{BackendError, LineStream, LogBroadcaster, LogEvent, TokenUsage};
use tracing::{debug, warn};

use crate::models::ChatCompletionChunk;
use crate::ollama_models::GenerateStreamLine;
use crate::translate::CompletionMeta;

/// One SSE frame of a translated chat stream.
#[derive(Debug, Clone)]
pub enum StreamFrame {
    Chunk(ChatCompletionChunk),
    Done,
}

impl StreamFrame {
    /// Encode as `data: <payload>\n\n`.
    pub fn to_sse(&self) -> Bytes {
        match self {
            Self::Chunk(chunk) => match serde_json::to_string(chunk) {
                Ok(json) => Bytes::from(format!("data: {json}\n\n")),
                Err(e) => {
                    warn!("Failed to serialize chunk: {e}");
                    Bytes::new()
                }
            },
            Self::Done => Bytes::from_static(b"data: [DONE]\n\n"),
        }
    }
}

/// Translated chat stream; an `Err` item is always the last one.
pub type FrameStream = BoxStream<'static, Result<StreamFrame, BackendError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Role,
    Lines,
    Usage,
    Done,
    Finished,
}

/// State threaded through the `unfold` stream.
struct TranslateState {
    lines: LineStream,
    meta: CompletionMeta,
    prompt: String,
    accumulated: String,
    broadcaster: LogBroadcaster,
    phase: Phase,
}

/// Translate backend NDJSON lines into OpenAI chunk frames.
///
/// Lines that are not valid JSON are skipped. A backend error ends the
/// stream after being published as an `error` event; no stop, usage or
/// `[DONE]` frame follows it.
pub fn translate_stream(
    lines: LineStream,
    meta: CompletionMeta,
    prompt: String,
    broadcaster: LogBroadcaster,
) -> FrameStream {
    let state = TranslateState {
        lines,
        meta,
        prompt,
        accumulated: String::new(),
        broadcaster,
        phase: Phase::Role,
    };

    futures_util::stream::unfold(state, |mut st| async move {
        match st.phase {
            Phase::Role => {
                st.phase = Phase::Lines;
                let frame = StreamFrame::Chunk(st.meta.role_chunk());
                Some((Ok(frame), st))
            }
            Phase::Lines => loop {
                match st.lines.next().await {
                    Some(Ok(line)) => {
                        let Ok(parsed) = serde_json::from_str::<GenerateStreamLine>(&line) else {
                            debug!(line = %line, "Skipping malformed stream line");
                            continue;
                        };
                        if parsed.done {
                            debug!(
                                chars = st.accumulated.len(),
                                "Backend reported end of generation"
                            );
                        }
                        let Some(fragment) = parsed.response else {
                            continue;
                        };
                        st.accumulated.push_str(&fragment);
                        st.broadcaster.publish(LogEvent::stream_chunk(fragment.clone()));
                        let frame = StreamFrame::Chunk(st.meta.content_chunk(fragment));
                        return Some((Ok(frame), st));
                    }
                    Some(Err(e)) => {
                        st.phase = Phase::Finished;
                        st.broadcaster
                            .publish(LogEvent::error(format!("Error in stream: {e}")));
                        return Some((Err(e), st));
                    }
                    None => {
                        st.phase = Phase::Usage;
                        st.broadcaster.publish(LogEvent::stream_end());
                        let frame = StreamFrame::Chunk(st.meta.stop_chunk());
                        return Some((Ok(frame), st));
                    }
                }
            },
            Phase::Usage => {
                st.phase = Phase::Done;
                let usage = TokenUsage::estimate(&st.prompt, &st.accumulated);
                let frame = StreamFrame::Chunk(st.meta.usage_chunk(usage));
                Some((Ok(frame), st))
            }
            Phase::Done => {
                st.phase = Phase::Finished;
                Some((Ok(StreamFrame::Done), st))
            }
            Phase::Finished => None,
        }
    })
    .boxed()
}

/// SSE body bytes for a translated stream.
///
/// A backend error becomes an I/O error so the connection is cut instead of
/// completing normally.
pub fn sse_body(
    frames: FrameStream,
) -> impl futures_util::Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static {
    frames.map(|frame| match frame {
        Ok(frame) => Ok(frame.to_sse()),
        Err(e) => Err(std::io::Error::other(e)),
    })
}
