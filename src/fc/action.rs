use crate::config::{CustomBackendConfig, FallbackMode};

/// How tool declarations are carried on the wire for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolAction {
    /// Send `tools` as native function tools.
    Native,
    /// Describe the tools in the system message and expect JSON replies.
    TextCatalogue,
    /// Send nothing about tools.
    Drop,
}

/// Tool-calling capability assumed for one wire attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolSupport {
    /// `None` means unknown, which is treated as supported.
    pub supports_tools: Option<bool>,
    pub fallback_mode: FallbackMode,
}

impl ToolSupport {
    #[must_use]
    pub fn from_config(config: &CustomBackendConfig) -> Self {
        Self {
            supports_tools: config.supports_tools,
            fallback_mode: config.fallback_mode,
        }
    }

    /// Whether structured `tool_calls` / `tool` messages may be sent.
    #[must_use]
    pub fn native_tools_allowed(self) -> bool {
        self.supports_tools != Some(false)
    }

    #[must_use]
    pub fn tool_action(self) -> ToolAction {
        if self.native_tools_allowed() {
            return ToolAction::Native;
        }
        match self.fallback_mode {
            FallbackMode::Text => ToolAction::TextCatalogue,
            FallbackMode::Disabled => ToolAction::Drop,
        }
    }

    /// Capability used for the retry after a tool-related failure.
    #[must_use]
    pub fn with_tools_disabled(self) -> Self {
        Self {
            supports_tools: Some(false),
            fallback_mode: FallbackMode::Text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn support(supports_tools: Option<bool>, fallback_mode: FallbackMode) -> ToolSupport {
        ToolSupport {
            supports_tools,
            fallback_mode,
        }
    }

    #[test]
    fn test_unknown_support_is_native() {
        assert_eq!(
            support(None, FallbackMode::Disabled).tool_action(),
            ToolAction::Native
        );
        assert_eq!(
            support(Some(true), FallbackMode::Text).tool_action(),
            ToolAction::Native
        );
    }

    #[test]
    fn test_unsupported_follows_fallback_mode() {
        assert_eq!(
            support(Some(false), FallbackMode::Text).tool_action(),
            ToolAction::TextCatalogue
        );
        assert_eq!(
            support(Some(false), FallbackMode::Disabled).tool_action(),
            ToolAction::Drop
        );
    }

    #[test]
    fn test_with_tools_disabled_forces_text() {
        let retry = support(None, FallbackMode::Disabled).with_tools_disabled();
        assert_eq!(retry.tool_action(), ToolAction::TextCatalogue);
        assert!(!retry.native_tools_allowed());
    }
}
