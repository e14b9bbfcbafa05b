//! Skill Handlers: memory-save, memory-search, memory-patch, send-reply,
//! and fetch-context — the fixed set of operations the agent can invoke,
//! either via protocol callback or the HTTP skill gateway.

pub mod handlers;
pub mod reply_state;
pub mod result;

pub use handlers::SkillHandlers;
pub use reply_state::ReplyStateTracker;
pub use result::SkillResult;

/// Names of the skills this gateway exposes, in the order the orchestrator
/// lists them to the agent.
pub const SKILL_NAMES: &[&str] = &[
    "memory-save",
    "memory-search",
    "memory-patch",
    "send-reply",
    "fetch-context",
];
