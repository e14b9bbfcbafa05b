use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The (platform, user, channel) triple a workspace is keyed on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceComponents {
    pub platform: String,
    pub user_id: String,
    pub channel_id: String,
}

impl WorkspaceComponents {
    pub fn key(&self) -> String {
        format!("{}/{}/{}", self.platform, self.user_id, self.channel_id)
    }
}

/// An isolated per-conversation working directory. Never deleted by the
/// system; `path` is the exclusive filesystem boundary for anything bound
/// to this workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub key: String,
    pub path: PathBuf,
    pub is_dm: bool,
    pub components: WorkspaceComponents,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    High,
    Normal,
}

/// One line of `memory.{public,private}.jsonl`. `content` is immutable once
/// written; everything else is mutated only via a later `PatchEvent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEvent {
    #[serde(rename = "type")]
    pub kind: MemoryEventKind,
    pub id: String,
    pub ts: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub visibility: Visibility,
    pub importance: Importance,
    pub content: String,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryEventKind {
    Memory,
}

/// A later toggle of `enabled`/`visibility`/`importance` for an existing
/// memory id. Never carries `content`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchEvent {
    #[serde(rename = "type")]
    pub kind: PatchEventKind,
    pub target_id: String,
    pub ts: DateTime<Utc>,
    pub changes: PatchChanges,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchEventKind {
    Patch,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatchChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<Importance>,
}

/// The logical view produced by folding a memory event with every
/// subsequent patch in `ts` order. `content` is never affected by a patch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedMemory {
    pub id: String,
    pub ts: DateTime<Utc>,
    pub enabled: bool,
    pub visibility: Visibility,
    pub importance: Importance,
    pub content: String,
}

/// Platform-agnostic representation of an incoming user message, produced
/// by an adapter and consumed by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub platform: String,
    pub channel_id: String,
    pub user_id: String,
    pub username: String,
    pub message_id: String,
    pub is_dm: bool,
    #[serde(default)]
    pub guild_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Historical record returned by an adapter's `fetch_recent`/`search_related`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformMessage {
    pub message_id: String,
    pub user_id: String,
    pub username: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub is_bot: bool,
}

/// Fields describing what an adapter can do, used by the context assembler
/// and skill handlers to decide whether an operation is even possible.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AdapterCapabilities {
    pub fetch_history: bool,
    pub search: bool,
    pub dm: bool,
    pub guild: bool,
    pub reactions: bool,
    pub max_message_length: usize,
}

/// Sections assembled by the context assembler, pre-`format()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledContext {
    pub system_prompt: String,
    pub important_memories: Vec<ResolvedMemory>,
    pub recent_messages: Vec<PlatformMessage>,
    #[serde(default)]
    pub related_messages: Option<Vec<PlatformMessage>>,
    pub trigger_message: PlatformMessage,
    pub estimated_tokens: usize,
    pub assembled_at: DateTime<Utc>,
}

/// The `{system_message, user_message, estimated_tokens}` triple produced by
/// `format()`, sent verbatim into the agent's `prompt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormattedContext {
    pub system_message: String,
    pub user_message: String,
    pub estimated_tokens: usize,
}
