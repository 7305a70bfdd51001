use super::gemini::{FinishReason, Role, UsageMetadata};
use super::openai_chat::{OpenAiRole, OpenAiUsage};

// ---------------------------------------------------------------------------
// Role mappings
// ---------------------------------------------------------------------------

#[must_use]
pub fn native_role_to_openai(role: Role) -> OpenAiRole {
    match role {
        Role::User => OpenAiRole::User,
        Role::Model => OpenAiRole::Assistant,
        Role::System => OpenAiRole::System,
    }
}

// ---------------------------------------------------------------------------
// Stop reason mappings
// ---------------------------------------------------------------------------

#[must_use]
pub fn openai_finish_to_native(finish_reason: &str) -> FinishReason {
    if finish_reason == "stop" {
        FinishReason::Stop
    } else {
        FinishReason::Other
    }
}

// ---------------------------------------------------------------------------
// Usage mapping
// ---------------------------------------------------------------------------

/// Copy whatever counters the backend reported; unknown stays unknown.
#[must_use]
pub fn openai_usage_to_native(usage: &OpenAiUsage) -> Option<UsageMetadata> {
    if usage.prompt_tokens.is_none()
        && usage.completion_tokens.is_none()
        && usage.total_tokens.is_none()
    {
        return None;
    }
    Some(UsageMetadata {
        prompt_token_count: usage.prompt_tokens,
        candidates_token_count: usage.completion_tokens,
        total_token_count: usage.total_tokens,
    })
}
