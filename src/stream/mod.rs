pub mod sse;

pub use sse::{wire_chunk_stream, SseLine, SseLineDecoder};

use std::collections::BTreeMap;
use std::time::Instant;

use futures_util::Stream;

use crate::error::AdapterError;
use crate::fc::parse_text_tool_call;
use crate::observability::log_request_complete;
use crate::protocol::gemini::{
    Candidate, Content, FinishReason, FunctionCall, GenerateContentResponse, Part, Role,
};
use crate::protocol::openai_chat::encoder::decode_tool_arguments;
use crate::protocol::openai_chat::response_decoder::{choice_tool_calls, decode_chat_chunk};
use crate::protocol::openai_chat::{OpenAiChatResponse, OpenAiStreamToolCall};

/// A native tool call being assembled from stream deltas.
#[derive(Debug, Default)]
struct PendingToolCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

/// Per-call state of one streaming response.
#[derive(Debug)]
pub struct StreamState {
    model: String,
    started: Instant,
    accumulated_text: String,
    last_chunk: Option<GenerateContentResponse>,
    pending_calls: BTreeMap<u32, PendingToolCall>,
    chunks_emitted: usize,
}

impl StreamState {
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            started: Instant::now(),
            accumulated_text: String::new(),
            last_chunk: None,
            pending_calls: BTreeMap::new(),
            chunks_emitted: 0,
        }
    }

    /// Decode one wire chunk into the native response to emit, if any.
    ///
    /// Tool-call fragments are buffered and attached as complete calls to
    /// the chunk that carries a finish reason. Chunks that end up with no
    /// parts, no finish reason and no usage are not emitted.
    pub fn absorb(&mut self, chunk: &OpenAiChatResponse) -> Option<GenerateContentResponse> {
        if let Some(choice) = chunk.choices.first() {
            self.absorb_tool_call_deltas(choice_tool_calls(choice));
        }

        let mut response = decode_chat_chunk(chunk);
        if let Some(candidate) = response.candidates.first_mut() {
            self.accumulated_text.push_str(&candidate.content.text());
            if candidate.finish_reason.is_some() {
                candidate
                    .content
                    .parts
                    .extend(self.take_pending_calls().into_iter().map(Part::FunctionCall));
            }
        }

        if is_empty_response(&response) {
            return None;
        }
        self.chunks_emitted += 1;
        self.last_chunk = Some(response.clone());
        Some(response)
    }

    /// Build the synthetic final chunk once the wire stream is over.
    ///
    /// Carries every tool call that was still being assembled plus a text
    /// invocation recovered from the accumulated text. Finish reason, index
    /// and usage come from the last emitted chunk; its text is not repeated.
    pub fn finish(&mut self) -> Option<GenerateContentResponse> {
        let mut calls = self.take_pending_calls();
        if let Some(invocation) = parse_text_tool_call(&self.accumulated_text) {
            calls.push(FunctionCall {
                id: None,
                name: invocation.tool_name,
                args: invocation.parameters,
            });
        }

        let last = self.last_chunk.take();
        tracing::debug!(
            chunks = self.chunks_emitted,
            text_len = self.accumulated_text.len(),
            recovered_calls = calls.len(),
            "stream completed"
        );
        log_request_complete(
            &self.model,
            last.as_ref().and_then(|r| r.usage_metadata.as_ref()),
            self.started,
        );
        if calls.is_empty() {
            return None;
        }

        let last_candidate = last.as_ref().and_then(|r| r.candidates.first());
        Some(GenerateContentResponse {
            candidates: vec![Candidate {
                content: Content::new(
                    Role::Model,
                    calls.into_iter().map(Part::FunctionCall).collect(),
                ),
                finish_reason: Some(
                    last_candidate
                        .and_then(|c| c.finish_reason)
                        .unwrap_or(FinishReason::Stop),
                ),
                index: last_candidate.map_or(0, |c| c.index),
            }],
            usage_metadata: last.as_ref().and_then(|r| r.usage_metadata),
        })
    }

    fn absorb_tool_call_deltas(&mut self, deltas: &[OpenAiStreamToolCall]) {
        for (pos, delta) in deltas.iter().enumerate() {
            let index = delta
                .index
                .unwrap_or_else(|| u32::try_from(pos).unwrap_or(u32::MAX));
            let pending = self.pending_calls.entry(index).or_default();
            if let Some(id) = delta.id.as_deref().filter(|id| !id.is_empty()) {
                pending.id = Some(id.to_string());
            }
            if let Some(function) = &delta.function {
                if let Some(name) = function.name.as_deref() {
                    if pending.name.is_empty() {
                        pending.name = name.to_string();
                    }
                }
                if let Some(arguments) = function.arguments_text() {
                    pending.arguments.push_str(&arguments);
                }
            }
        }
    }

    fn take_pending_calls(&mut self) -> Vec<FunctionCall> {
        std::mem::take(&mut self.pending_calls)
            .into_values()
            .filter(|pending| !pending.name.is_empty())
            .map(|pending| FunctionCall {
                id: pending.id,
                args: decode_tool_arguments(&pending.arguments),
                name: pending.name,
            })
            .collect()
    }
}

fn is_empty_response(response: &GenerateContentResponse) -> bool {
    response.usage_metadata.is_none()
        && response
            .candidates
            .iter()
            .all(|c| c.content.parts.is_empty() && c.finish_reason.is_none())
}

/// Reassemble a stream of wire chunks into native responses.
///
/// One response per meaningful wire chunk, then at most one synthetic
/// final chunk (see [`StreamState::finish`]). An error item ends the
/// sequence. `model` only labels the completion log.
pub fn native_response_stream<S>(
    chunks: S,
    model: String,
) -> impl Stream<Item = Result<GenerateContentResponse, AdapterError>> + Send
where
    S: Stream<Item = Result<OpenAiChatResponse, AdapterError>> + Send + 'static,
{
    use futures_util::StreamExt;

    futures_util::stream::unfold(
        (Box::pin(chunks), StreamState::new(model), false),
        |(mut chunks, mut state, finished)| async move {
            if finished {
                return None;
            }
            loop {
                match chunks.as_mut().next().await {
                    Some(Ok(chunk)) => {
                        if let Some(response) = state.absorb(&chunk) {
                            return Some((Ok(response), (chunks, state, false)));
                        }
                    }
                    Some(Err(err)) => return Some((Err(err), (chunks, state, true))),
                    None => {
                        let last = state.finish()?;
                        return Some((Ok(last), (chunks, state, true)));
                    }
                }
            }
        },
    )
}
