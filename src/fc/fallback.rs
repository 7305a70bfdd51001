use crate::config::{FallbackMode, FeaturesConfig};
use crate::error::FailureCause;

use super::action::ToolSupport;

/// Retry budget for the tool-capability fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackPolicy {
    pub max_fallback_attempts: u32,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            max_fallback_attempts: 1,
        }
    }
}

impl FallbackPolicy {
    #[must_use]
    pub fn from_features(features: &FeaturesConfig) -> Self {
        Self {
            max_fallback_attempts: features.max_fallback_attempts,
        }
    }

    /// Decide whether a failed attempt should be re-issued with tools off.
    ///
    /// All conditions must hold:
    /// - the failure was classified as [`FailureCause::ToolIncompatible`]
    /// - tool support was not already known to be false
    /// - the fallback mode is not `disabled`
    /// - fewer than `max_fallback_attempts` retries have been spent
    #[must_use]
    pub fn allows_retry(self, cause: FailureCause, support: ToolSupport, retries_used: u32) -> bool {
        cause == FailureCause::ToolIncompatible
            && support.supports_tools != Some(false)
            && support.fallback_mode != FallbackMode::Disabled
            && retries_used < self.max_fallback_attempts
    }
}
