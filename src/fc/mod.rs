pub mod parser;
pub mod prompt;

mod action;
mod fallback;
mod summary;

pub use action::{ToolAction, ToolSupport};
pub use fallback::FallbackPolicy;
pub use parser::{parse_text_tool_call, TextToolInvocation};
pub use summary::summarize_tool_responses;
