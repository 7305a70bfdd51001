pub mod call_ids;
pub mod gemini;
pub mod mapping;
pub mod openai_chat;
