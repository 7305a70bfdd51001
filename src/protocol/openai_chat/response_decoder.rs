use serde_json::Value;

use crate::fc::parse_text_tool_call;
use crate::protocol::gemini::{
    Candidate, Content, FinishReason, FunctionCall, GenerateContentResponse, Part, Role,
};
use crate::protocol::mapping::{openai_finish_to_native, openai_usage_to_native};

use super::encoder::decode_tool_arguments;
use super::{OpenAiChatResponse, OpenAiChoice, OpenAiStreamToolCall};

/// Flatten a wire `content` value: a plain string, or the `text` of every
/// `{type: "text"}` part of an array, in order.
pub(crate) fn content_value_text(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter(|part| {
                part.get("type")
                    .and_then(Value::as_str)
                    .map_or(true, |t| t == "text")
            })
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect(),
        _ => String::new(),
    }
}

/// First non-empty text of `message.content` or `delta.content`.
#[must_use]
pub fn choice_text(choice: &OpenAiChoice) -> Option<String> {
    [choice.message.as_ref(), choice.delta.as_ref()]
        .into_iter()
        .flatten()
        .filter_map(|msg| msg.content.as_ref())
        .map(content_value_text)
        .find(|text| !text.is_empty())
}

pub(crate) fn choice_tool_calls(choice: &OpenAiChoice) -> &[OpenAiStreamToolCall] {
    choice
        .message
        .as_ref()
        .or(choice.delta.as_ref())
        .and_then(|msg| msg.tool_calls.as_deref())
        .unwrap_or_default()
}

/// Complete function call from a wire tool call; entries without a
/// function name are skipped.
fn decode_tool_call(tool_call: &OpenAiStreamToolCall) -> Option<FunctionCall> {
    let function = tool_call.function.as_ref()?;
    let name = function.name.as_deref().filter(|n| !n.is_empty())?;
    Some(FunctionCall {
        id: tool_call.id.clone(),
        name: name.to_string(),
        args: decode_tool_arguments(function.arguments_text().as_deref().unwrap_or_default()),
    })
}

/// Decode a complete (non-streaming) wire response.
///
/// Text that carries a `{"tool_name": ...}` invocation additionally yields a
/// function call part after the text part; native `tool_calls` follow.
#[must_use]
pub fn decode_chat_response(response: &OpenAiChatResponse) -> GenerateContentResponse {
    let usage_metadata = response.usage.as_ref().and_then(openai_usage_to_native);
    let Some(choice) = response.choices.first() else {
        return GenerateContentResponse {
            candidates: Vec::new(),
            usage_metadata,
        };
    };

    let mut parts = Vec::new();
    if let Some(text) = choice_text(choice) {
        let invocation = parse_text_tool_call(&text);
        parts.push(Part::Text(text));
        if let Some(invocation) = invocation {
            parts.push(Part::FunctionCall(FunctionCall {
                id: None,
                name: invocation.tool_name,
                args: invocation.parameters,
            }));
        }
    }
    parts.extend(
        choice_tool_calls(choice)
            .iter()
            .filter_map(decode_tool_call)
            .map(Part::FunctionCall),
    );

    GenerateContentResponse {
        candidates: vec![Candidate {
            content: Content::new(Role::Model, parts),
            finish_reason: Some(
                choice
                    .finish_reason
                    .as_deref()
                    .map_or(FinishReason::Other, openai_finish_to_native),
            ),
            index: choice.index,
        }],
        usage_metadata,
    }
}

/// Decode one streamed wire chunk.
///
/// Only the delta text is carried over: text tool invocations are
/// recovered from the accumulated stream text, and tool-call fragments are
/// reassembled by the stream state, so neither is looked at here. An absent
/// `finish_reason` stays absent.
#[must_use]
pub fn decode_chat_chunk(chunk: &OpenAiChatResponse) -> GenerateContentResponse {
    let usage_metadata = chunk.usage.as_ref().and_then(openai_usage_to_native);
    let Some(choice) = chunk.choices.first() else {
        return GenerateContentResponse {
            candidates: Vec::new(),
            usage_metadata,
        };
    };
    let parts = choice_text(choice).map(Part::Text).into_iter().collect();
    GenerateContentResponse {
        candidates: vec![Candidate {
            content: Content::new(Role::Model, parts),
            finish_reason: choice.finish_reason.as_deref().map(openai_finish_to_native),
            index: choice.index,
        }],
        usage_metadata,
    }
}
