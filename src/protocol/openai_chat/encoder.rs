use serde_json::{json, Value};

use crate::error::AdapterError;
use crate::fc::prompt::{generate_tool_catalogue, render_text_invocation};
use crate::fc::{ToolAction, ToolSupport};
use crate::protocol::call_ids::CallIdBindings;
use crate::protocol::gemini::{Content, FunctionDeclaration, GenerateContentRequest, Part};
use crate::protocol::mapping::native_role_to_openai;

use super::{
    OpenAiChatRequest, OpenAiMessage, OpenAiRole, OpenAiTool, OpenAiToolCall,
    OpenAiToolCallFunction, OpenAiToolFunction,
};

const TOOL_RESULTS_PREAMBLE: &str = "Previous tool execution results:";

/// Encode a native request into the `OpenAI` Chat Completions wire format.
///
/// `support` decides how tool declarations, function calls and function
/// responses are carried; see [`ToolAction`].
///
/// # Errors
///
/// Returns [`AdapterError::Translation`] when a function declaration has no
/// name.
pub fn encode_chat_request(
    request: &GenerateContentRequest,
    model: &str,
    support: ToolSupport,
    stream: bool,
) -> Result<OpenAiChatRequest, AdapterError> {
    let declarations: Vec<&FunctionDeclaration> = request.function_declarations().collect();
    if let Some(unnamed) = declarations.iter().position(|d| d.name.trim().is_empty()) {
        return Err(AdapterError::Translation(format!(
            "function declaration #{unnamed} has no name"
        )));
    }

    let mut messages: Vec<OpenAiMessage> =
        Vec::with_capacity(request.contents.len() + usize::from(request.system_instruction.is_some()));

    if let Some(system) = &request.system_instruction {
        messages.push(OpenAiMessage::text(OpenAiRole::System, system.text()));
    }

    let mut bindings = CallIdBindings::new();
    for content in &request.contents {
        encode_content(content, support, &mut bindings, &mut messages);
    }

    let action = support.tool_action();
    if action == ToolAction::TextCatalogue && !declarations.is_empty() {
        append_system_text(&mut messages, &generate_tool_catalogue(&declarations));
    }

    messages.retain(|msg| {
        !msg.content.is_empty() || msg.tool_calls.is_some() || msg.tool_call_id.is_some()
    });

    let tools = if action == ToolAction::Native && !declarations.is_empty() {
        Some(declarations.iter().map(|decl| encode_tool(decl)).collect())
    } else {
        None
    };

    let generation = request.generation_config.clone().unwrap_or_default();

    Ok(OpenAiChatRequest {
        model: model.to_string(),
        messages,
        tools,
        stream,
        temperature: generation.temperature,
        max_tokens: generation.max_output_tokens,
        top_p: generation.top_p,
    })
}

/// Translate one native turn, pushing the resulting wire messages in order:
/// the turn's own message first, then any tool-result messages.
fn encode_content(
    content: &Content,
    support: ToolSupport,
    bindings: &mut CallIdBindings,
    out: &mut Vec<OpenAiMessage>,
) {
    let native_tools = support.native_tools_allowed();
    let mut text = String::new();
    let mut tool_calls: Vec<OpenAiToolCall> = Vec::new();
    let mut tool_messages: Vec<OpenAiMessage> = Vec::new();
    let mut result_lines: Vec<String> = Vec::new();

    for part in &content.parts {
        match part {
            Part::Text(t) => text.push_str(t),
            Part::FunctionCall(call) if native_tools => {
                let id = bindings.bind_call(&call.name, call.id.as_deref());
                tool_calls.push(OpenAiToolCall {
                    id,
                    type_: "function".to_string(),
                    function: OpenAiToolCallFunction {
                        name: call.name.clone(),
                        arguments: call.args.to_string(),
                    },
                });
            }
            Part::FunctionCall(call) => {
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str(&render_text_invocation(&call.name, &call.args));
            }
            Part::FunctionResponse(response) if native_tools => {
                let id = bindings.resolve_response(&response.name, response.id.as_deref());
                tool_messages.push(OpenAiMessage {
                    role: OpenAiRole::Tool,
                    content: response.flattened_output(),
                    tool_calls: None,
                    tool_call_id: Some(id),
                });
            }
            Part::FunctionResponse(response) => {
                result_lines.push(format!(
                    "- {}: {}",
                    response.name,
                    response.flattened_output()
                ));
            }
        }
    }

    out.push(OpenAiMessage {
        role: native_role_to_openai(content.role),
        content: text,
        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        tool_call_id: None,
    });
    out.extend(tool_messages);

    if !result_lines.is_empty() {
        out.push(OpenAiMessage::text(
            OpenAiRole::User,
            format!("{TOOL_RESULTS_PREAMBLE}\n{}", result_lines.join("\n")),
        ));
    }
}

fn append_system_text(messages: &mut Vec<OpenAiMessage>, extra: &str) {
    if let Some(system) = messages.iter_mut().find(|m| m.role == OpenAiRole::System) {
        if !system.content.is_empty() {
            system.content.push_str("\n\n");
        }
        system.content.push_str(extra);
    } else {
        messages.insert(0, OpenAiMessage::text(OpenAiRole::System, extra));
    }
}

fn encode_tool(decl: &FunctionDeclaration) -> OpenAiTool {
    OpenAiTool {
        type_: "function".to_string(),
        function: OpenAiToolFunction {
            name: decl.name.clone(),
            description: decl.description.clone(),
            parameters: decl
                .parameters
                .clone()
                .unwrap_or_else(|| json!({"type": "object", "properties": {}})),
        },
    }
}

/// Arguments of a wire tool call as a JSON object; anything that is not
/// a JSON object becomes `{}`.
pub(crate) fn decode_tool_arguments(arguments: &str) -> Value {
    match serde_json::from_str::<Value>(arguments) {
        Ok(obj @ Value::Object(_)) => obj,
        _ => Value::Object(serde_json::Map::new()),
    }
}
