use serde::Serialize;

/// Structured trace events emitted across all gateway crates.
///
/// Each variant is logged as a single `tracing::info!` call carrying the
/// serialized event as a field, so a JSON log formatter renders one line per
/// lifecycle transition without us having to hand-format messages at every
/// call site.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    WorkspaceResolved {
        workspace_key: String,
        path: String,
        created: bool,
    },
    MemoryAppended {
        workspace_key: String,
        kind: &'static str,
        id: String,
    },
    MemoryLineSkipped {
        workspace_key: String,
        file: String,
        reason: String,
    },
    SessionRegistered {
        session_id: String,
        workspace_key: String,
        timeout_ms: u64,
    },
    SessionExpired {
        session_id: String,
    },
    ReplyDispatched {
        session_id: String,
        channel_id: String,
        chars: usize,
    },
    SkillInvoked {
        session_id: String,
        skill: String,
        success: bool,
    },
    DuplicateEventRejected {
        platform: String,
        message_id: String,
    },
    AgentSpawned {
        session_id: String,
        command: String,
    },
    AgentDisconnected {
        session_id: String,
        reason: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "gw_event");
    }
}
