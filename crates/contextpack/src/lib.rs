//! Context Assembler: merges system prompt, memory, and platform history
//! into the prompt sent to the reasoning agent.

pub mod assembler;
pub mod format;
pub mod token;

pub use assembler::ContextAssembler;
pub use format::{format, truncate_to_token_limit};
pub use token::estimate_tokens;
