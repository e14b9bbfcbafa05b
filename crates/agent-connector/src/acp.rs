//! Agent Client Protocol payload shapes: the server-bound calls we make
//! (`initialize`, `newSession`, `setSessionModel`, `prompt`, `cancel`) and
//! the client-bound calls the agent makes back into us (`requestPermission`,
//! `sessionUpdate`, `readTextFile`, `writeTextFile`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: u32 = 1;

// ── initialize ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientCapabilities {
    pub fs: FsCapabilities,
    pub terminal: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FsCapabilities {
    pub read_text_file: bool,
    pub write_text_file: bool,
}

impl Default for ClientCapabilities {
    fn default() -> Self {
        Self {
            fs: FsCapabilities {
                read_text_file: true,
                write_text_file: true,
            },
            terminal: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: u32,
    pub client_capabilities: ClientCapabilities,
}

impl Default for InitializeParams {
    fn default() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            client_capabilities: ClientCapabilities::default(),
        }
    }
}

/// What the agent told us it can do. Unknown fields collapse into `raw`
/// rather than failing to parse — a newer agent binary may advertise
/// capabilities this connector doesn't know about yet.
#[derive(Debug, Clone, Default)]
pub struct AgentCapabilities {
    pub mcp_stdio: bool,
    pub mcp_http: bool,
    pub raw: Value,
}

impl AgentCapabilities {
    pub fn from_initialize_result(result: &Value) -> Self {
        let caps = result.get("agentCapabilities").cloned().unwrap_or(Value::Null);
        let mcp_stdio = caps
            .get("mcpCapabilities")
            .and_then(|v| v.get("stdio"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let mcp_http = caps
            .get("mcpCapabilities")
            .and_then(|v| v.get("http"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Self {
            mcp_stdio,
            mcp_http,
            raw: caps,
        }
    }
}

// ── newSession ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolServerTransport {
    Stdio,
    Http,
}

/// A co-spawned tool server the agent should also connect to for this
/// session, alongside the workspace's own skills.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolServerRef {
    pub name: String,
    pub transport: ToolServerTransport,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSessionParams {
    pub cwd: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mcp_servers: Vec<ToolServerRef>,
}

// ── setSessionModel ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetSessionModelParams {
    pub session_id: String,
    pub model_id: String,
}

// ── prompt ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptParams {
    pub session_id: String,
    pub prompt: Vec<ContentBlock>,
}

/// Why a `prompt` call stopped, parsed from its `stopReason` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptOutcome {
    EndTurn,
    Cancelled,
    MaxTurnsReached,
    Refusal,
    Other(String),
}

impl PromptOutcome {
    pub fn from_result(result: &Value) -> Self {
        match result.get("stopReason").and_then(Value::as_str) {
            Some("end_turn") => Self::EndTurn,
            Some("cancelled") => Self::Cancelled,
            Some("max_turn_requests") => Self::MaxTurnsReached,
            Some("refusal") => Self::Refusal,
            Some(other) => Self::Other(other.to_string()),
            None => Self::Other("unknown".to_string()),
        }
    }
}

// ── cancel ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelParams {
    pub session_id: String,
}

// ── requestPermission (child → us) ──────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallInfo {
    pub tool_call_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default, rename = "rawInput")]
    pub raw_input: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionOption {
    pub option_id: String,
    #[serde(default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPermissionParams {
    pub session_id: String,
    pub tool_call: ToolCallInfo,
    #[serde(default)]
    pub options: Vec<PermissionOption>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestPermissionResult {
    #[serde(flatten)]
    pub outcome: PermissionOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PermissionOutcome {
    Selected {
        #[serde(rename = "optionId")]
        option_id: String,
    },
    Cancelled,
}

/// The name this connector tries first for a skill-gated tool call, per
/// spec.md §9: the source sometimes keys off `rawInput.skill` and
/// sometimes off `title`; we try the former and fall back to the latter.
pub fn tool_call_skill_name(tool_call: &ToolCallInfo) -> Option<String> {
    tool_call
        .raw_input
        .get("skill")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| Some(tool_call.title.clone()).filter(|t| !t.is_empty()))
}

// ── sessionUpdate (child → us, notification) ────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdateParams {
    pub session_id: String,
    pub update: Value,
}

// ── readTextFile / writeTextFile (child → us) ───────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadTextFileParams {
    pub session_id: String,
    pub path: String,
    #[serde(default)]
    pub line: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadTextFileResult {
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteTextFileParams {
    pub session_id: String,
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WriteTextFileResult {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skill_name_prefers_raw_input_over_title() {
        let tool_call = ToolCallInfo {
            tool_call_id: "t1".into(),
            title: "Save a memory".into(),
            kind: None,
            raw_input: serde_json::json!({"skill": "memory-save"}),
        };
        assert_eq!(tool_call_skill_name(&tool_call).as_deref(), Some("memory-save"));
    }

    #[test]
    fn skill_name_falls_back_to_title() {
        let tool_call = ToolCallInfo {
            tool_call_id: "t1".into(),
            title: "send-reply".into(),
            kind: None,
            raw_input: serde_json::json!({}),
        };
        assert_eq!(tool_call_skill_name(&tool_call).as_deref(), Some("send-reply"));
    }

    #[test]
    fn prompt_outcome_parses_known_reasons() {
        assert_eq!(
            PromptOutcome::from_result(&serde_json::json!({"stopReason": "end_turn"})),
            PromptOutcome::EndTurn
        );
        assert_eq!(
            PromptOutcome::from_result(&serde_json::json!({"stopReason": "cancelled"})),
            PromptOutcome::Cancelled
        );
    }

    #[test]
    fn agent_capabilities_reads_mcp_flags() {
        let result = serde_json::json!({
            "agentCapabilities": { "mcpCapabilities": { "stdio": true, "http": false } }
        });
        let caps = AgentCapabilities::from_initialize_result(&result);
        assert!(caps.mcp_stdio);
        assert!(!caps.mcp_http);
    }
}
