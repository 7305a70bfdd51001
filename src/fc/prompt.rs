use crate::protocol::gemini::FunctionDeclaration;

/// Key the model must use for the tool name in a text-mode invocation.
pub const TOOL_NAME_KEY: &str = "tool_name";
/// Key the model must use for the arguments object in a text-mode invocation.
pub const PARAMETERS_KEY: &str = "parameters";

// ---------------------------------------------------------------------------
// Tool list formatting
// ---------------------------------------------------------------------------

fn param_type(p_info: &serde_json::Value) -> &str {
    p_info
        .as_object()
        .and_then(|o| o.get("type"))
        .and_then(|v| v.as_str())
        .unwrap_or("any")
}

fn format_param_detail(p_name: &str, p_info: &serde_json::Value, required: &[&str]) -> String {
    let is_required = if required.contains(&p_name) {
        "required"
    } else {
        "optional"
    };
    let mut line = format!("   - {p_name} ({}, {is_required})", param_type(p_info));
    if let Some(desc) = p_info.get("description").and_then(|v| v.as_str()) {
        line.push_str(": ");
        line.push_str(desc);
    }
    if let Some(values) = p_info.get("enum") {
        line.push_str(&format!(" [one of {values}]"));
    }
    line
}

fn format_tool(idx: usize, decl: &FunctionDeclaration) -> String {
    let description = decl
        .description
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .unwrap_or("No description");
    let mut block = format!("{idx}. {}: {description}", decl.name);

    let schema = decl.parameters.as_ref();
    let required: Vec<&str> = schema
        .and_then(|s| s.get("required"))
        .and_then(|r| r.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();
    let props = schema
        .and_then(|s| s.get("properties"))
        .and_then(|p| p.as_object())
        .filter(|p| !p.is_empty());

    match props {
        None => block.push_str("\n   Parameters: none"),
        Some(props) => {
            block.push_str("\n   Parameters:");
            for (p_name, p_info) in props {
                block.push('\n');
                block.push_str(&format_param_detail(p_name, p_info, &required));
            }
        }
    }
    block
}

/// Natural-language catalogue of the declared tools, instructing the model
/// to answer with a bare `{"tool_name": ..., "parameters": {...}}` object
/// when it wants to call one.
#[must_use]
pub fn generate_tool_catalogue(declarations: &[&FunctionDeclaration]) -> String {
    let tools_list = declarations
        .iter()
        .enumerate()
        .map(|(i, decl)| format_tool(i + 1, decl))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You have access to the following tools:\n\n\
         {tools_list}\n\n\
         When you need to use a tool, respond with ONLY a JSON object in exactly this format and nothing else:\n\
         {{\"{TOOL_NAME_KEY}\": \"<tool name>\", \"{PARAMETERS_KEY}\": {{<arguments>}}}}\n\n\
         Use the exact tool name from the list and put every required parameter in \"{PARAMETERS_KEY}\". \
         Call at most one tool per response. If no tool is needed, answer the user normally in plain text."
    )
}

/// Render a call the model made earlier in the text-mode invocation format.
#[must_use]
pub fn render_text_invocation(name: &str, args: &serde_json::Value) -> String {
    serde_json::json!({ TOOL_NAME_KEY: name, PARAMETERS_KEY: args }).to_string()
}
