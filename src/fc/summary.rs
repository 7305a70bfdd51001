use crate::protocol::gemini::{
    FinishReason, FunctionResponse, GenerateContentRequest, GenerateContentResponse, Part,
};

const GENERIC_SUMMARY: &str = "Tool execution completed.";

/// Answer a request that only reports tool results, without a wire call.
///
/// Returns `None` for an empty request or when any content carries a part
/// other than a function response. Contents without parts do not count
/// against this; when no response is found at all the generic sentence is
/// returned.
#[must_use]
pub fn summarize_tool_responses(request: &GenerateContentRequest) -> Option<GenerateContentResponse> {
    if request.contents.is_empty() {
        return None;
    }
    let only_responses = request
        .contents
        .iter()
        .flat_map(|content| content.parts.iter())
        .all(Part::is_function_response);
    if !only_responses {
        return None;
    }

    let lines: Vec<String> = request
        .contents
        .iter()
        .flat_map(|content| content.parts.iter())
        .filter_map(|part| match part {
            Part::FunctionResponse(response) => Some(summary_line(response)),
            Part::Text(_) | Part::FunctionCall(_) => None,
        })
        .collect();

    let text = if lines.is_empty() {
        GENERIC_SUMMARY.to_string()
    } else {
        lines.join("\n")
    };
    Some(GenerateContentResponse::from_text(text, FinishReason::Stop))
}

fn summary_line(response: &FunctionResponse) -> String {
    format!(
        "Tool {} executed successfully. Result: {}.",
        response.name,
        response.flattened_output()
    )
}
