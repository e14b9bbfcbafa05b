//! The five skill handlers the agent can invoke: memory-save,
//! memory-search, memory-patch, send-reply, fetch-context. Each validates
//! its own parameters and returns a uniform [`SkillResult`] — handlers
//! never panic and never propagate an error past their own boundary.

use std::sync::Arc;

use gw_adapter::{PlatformAdapter, ReplyOptions};
use gw_domain::types::{Importance, PatchChanges, Visibility, Workspace};
use gw_memory::{MemoryLog, SaveOptions};
use serde_json::{json, Value};

use crate::reply_state::ReplyStateTracker;
use crate::result::SkillResult;

pub struct SkillHandlers {
    memory: Arc<MemoryLog>,
    reply_state: Arc<ReplyStateTracker>,
    memory_max_chars: usize,
}

impl SkillHandlers {
    pub fn new(
        memory: Arc<MemoryLog>,
        reply_state: Arc<ReplyStateTracker>,
        memory_max_chars: usize,
    ) -> Self {
        Self {
            memory,
            reply_state,
            memory_max_chars,
        }
    }

    pub async fn memory_save(&self, workspace: &Workspace, params: &Value) -> SkillResult {
        let content = match params.get("content").and_then(Value::as_str) {
            Some(c) if !c.trim().is_empty() => c.to_string(),
            _ => return SkillResult::fail("Missing or invalid 'content' parameter"),
        };

        let visibility = match params.get("visibility") {
            None => Visibility::Public,
            Some(Value::String(s)) if s == "public" => Visibility::Public,
            Some(Value::String(s)) if s == "private" => Visibility::Private,
            Some(_) => {
                return SkillResult::fail(
                    "Invalid 'visibility' parameter. Must be 'public' or 'private'",
                )
            }
        };

        let importance = match params.get("importance") {
            None => Importance::Normal,
            Some(Value::String(s)) if s == "high" => Importance::High,
            Some(Value::String(s)) if s == "normal" => Importance::Normal,
            Some(_) => {
                return SkillResult::fail(
                    "Invalid 'importance' parameter. Must be 'high' or 'normal'",
                )
            }
        };

        match self
            .memory
            .add(workspace, content, SaveOptions { visibility, importance })
            .await
        {
            Ok(event) => SkillResult::ok(json!(event)),
            Err(err) => SkillResult::fail(err.to_string()),
        }
    }

    pub fn memory_search(&self, workspace: &Workspace, params: &Value) -> SkillResult {
        let query = match params.get("query").and_then(Value::as_str) {
            Some(q) => q.to_string(),
            None => return SkillResult::fail("Missing or invalid 'query' parameter"),
        };

        let limit = match parse_positive_limit(params, 10) {
            Ok(limit) => limit,
            Err(message) => return SkillResult::fail(message),
        };

        match self
            .memory
            .search(workspace, &query, limit, self.memory_max_chars)
        {
            Ok(results) => SkillResult::ok(json!(results)),
            Err(err) => SkillResult::fail(err.to_string()),
        }
    }

    pub async fn memory_patch(&self, workspace: &Workspace, params: &Value) -> SkillResult {
        let memory_id = match params.get("memory_id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => return SkillResult::fail("Missing or invalid 'memory_id' parameter"),
        };

        let mut changes = PatchChanges::default();
        let mut provided = false;

        if let Some(value) = params.get("enabled") {
            match value.as_bool() {
                Some(b) => {
                    changes.enabled = Some(b);
                    provided = true;
                }
                None => return SkillResult::fail("Invalid 'enabled' parameter. Must be a boolean"),
            }
        }

        if let Some(value) = params.get("visibility") {
            match value.as_str() {
                Some("public") => {
                    changes.visibility = Some(Visibility::Public);
                    provided = true;
                }
                Some("private") => {
                    changes.visibility = Some(Visibility::Private);
                    provided = true;
                }
                _ => {
                    return SkillResult::fail(
                        "Invalid 'visibility' parameter. Must be 'public' or 'private'",
                    )
                }
            }
        }

        if let Some(value) = params.get("importance") {
            match value.as_str() {
                Some("high") => {
                    changes.importance = Some(Importance::High);
                    provided = true;
                }
                Some("normal") => {
                    changes.importance = Some(Importance::Normal);
                    provided = true;
                }
                _ => {
                    return SkillResult::fail(
                        "Invalid 'importance' parameter. Must be 'high' or 'normal'",
                    )
                }
            }
        }

        if !provided {
            return SkillResult::fail(
                "At least one of 'enabled', 'visibility', or 'importance' must be provided",
            );
        }

        match self.memory.patch(workspace, memory_id, changes).await {
            Ok(event) => SkillResult::ok(json!(event)),
            Err(err) => SkillResult::fail(err.to_string()),
        }
    }

    pub async fn send_reply(
        &self,
        workspace: &Workspace,
        channel_id: &str,
        adapter: &dyn PlatformAdapter,
        params: &Value,
    ) -> SkillResult {
        let message = match params.get("message").and_then(Value::as_str) {
            Some(m) => m,
            None => return SkillResult::fail("Missing or invalid 'message' parameter"),
        };
        let trimmed = message.trim();
        if trimmed.is_empty() {
            return SkillResult::fail("Message cannot be empty");
        }

        if let Some(attachments) = params.get("attachments") {
            match attachments {
                Value::Array(items) => {
                    if !items.is_empty() {
                        tracing::warn!(
                            workspace = %workspace.key,
                            count = items.len(),
                            "send-reply attachments were provided but are not dispatched"
                        );
                    }
                }
                _ => {
                    return SkillResult::fail("Invalid 'attachments' parameter. Must be an array")
                }
            }
        }

        if self.reply_state.has_sent(&workspace.key, channel_id) {
            return SkillResult::fail("Reply can only be sent once per interaction");
        }

        if let Err(err) = adapter
            .send_reply(channel_id, message, ReplyOptions::default())
            .await
        {
            return SkillResult::fail(err.to_string());
        }

        if !self.reply_state.mark_sent(&workspace.key, channel_id) {
            return SkillResult::fail("Reply can only be sent once per interaction");
        }

        SkillResult::ok_empty()
    }

    pub async fn fetch_context(
        &self,
        workspace: &Workspace,
        channel_id: &str,
        guild_id: &str,
        user_id: &str,
        adapter: &dyn PlatformAdapter,
        params: &Value,
    ) -> SkillResult {
        let fetch_type = match params.get("type").and_then(Value::as_str) {
            Some(t) => t,
            None => return SkillResult::fail("Missing or invalid 'type' parameter"),
        };

        match fetch_type {
            "recent_messages" => {
                let limit = match parse_positive_limit(params, 20) {
                    Ok(limit) => limit,
                    Err(message) => return SkillResult::fail(message),
                };
                match adapter.fetch_recent(channel_id, limit).await {
                    Ok(messages) => SkillResult::ok(json!(messages)),
                    Err(err) => SkillResult::fail(err.to_string()),
                }
            }
            "search_messages" => {
                if !adapter.capabilities().search {
                    return SkillResult::fail("Platform does not support message search");
                }
                let query = match params.get("query").and_then(Value::as_str) {
                    Some(q) if !q.is_empty() => q,
                    _ => {
                        return SkillResult::fail(
                            "Missing or invalid 'query' parameter for search_messages type",
                        )
                    }
                };
                let limit = match parse_positive_limit(params, 20) {
                    Ok(limit) => limit,
                    Err(message) => return SkillResult::fail(message),
                };
                match adapter
                    .search_related(guild_id, channel_id, query, limit)
                    .await
                {
                    Ok(Some(messages)) => SkillResult::ok(json!(messages)),
                    Ok(None) => SkillResult::fail("Platform does not support message search"),
                    Err(err) => SkillResult::fail(err.to_string()),
                }
            }
            "user_info" => match adapter.get_username(user_id).await {
                Ok(username) => SkillResult::ok(json!({
                    "userId": user_id,
                    "username": username,
                    "platform": workspace.components.platform,
                    "isDm": workspace.is_dm,
                })),
                Err(err) => SkillResult::fail(err.to_string()),
            },
            _ => SkillResult::fail(
                "Invalid 'type' parameter. Must be one of: recent_messages, search_messages, user_info",
            ),
        }
    }
}

fn parse_positive_limit(params: &Value, default: usize) -> Result<usize, &'static str> {
    match params.get("limit") {
        None => Ok(default),
        Some(Value::Number(n)) => {
            let as_i64 = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64));
            match as_i64 {
                Some(v) if v > 0 => Ok(v as usize),
                _ => Err("Invalid 'limit' parameter. Must be a positive number"),
            }
        }
        Some(_) => Err("Invalid 'limit' parameter. Must be a positive number"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gw_adapter::MockAdapter;
    use gw_domain::types::{AdapterCapabilities, WorkspaceComponents};
    use tempfile::tempdir;

    fn workspace(dir: &std::path::Path, is_dm: bool) -> Workspace {
        Workspace {
            key: "discord/u1/c1".to_string(),
            path: dir.to_path_buf(),
            is_dm,
            components: WorkspaceComponents {
                platform: "discord".to_string(),
                user_id: "u1".to_string(),
                channel_id: "c1".to_string(),
            },
        }
    }

    fn handlers() -> SkillHandlers {
        SkillHandlers::new(Arc::new(MemoryLog::new()), Arc::new(ReplyStateTracker::new()), 500)
    }

    #[tokio::test]
    async fn memory_save_rejects_missing_content() {
        let dir = tempdir().unwrap();
        let ws = workspace(dir.path(), true);
        let handlers = handlers();
        let result = handlers.memory_save(&ws, &json!({})).await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap(), "Missing or invalid 'content' parameter");
    }

    #[tokio::test]
    async fn memory_save_rejects_private_outside_dm() {
        let dir = tempdir().unwrap();
        let ws = workspace(dir.path(), false);
        let handlers = handlers();
        let result = handlers
            .memory_save(&ws, &json!({"content": "x", "visibility": "private"}))
            .await;
        assert!(!result.success);
        assert_eq!(
            result.error.unwrap(),
            "Private memories can only be saved in DM contexts"
        );
    }

    #[tokio::test]
    async fn memory_save_then_search_roundtrips() {
        let dir = tempdir().unwrap();
        let ws = workspace(dir.path(), true);
        let handlers = handlers();
        handlers
            .memory_save(&ws, &json!({"content": "User likes hiking in mountains"}))
            .await;
        let result = handlers.memory_search(&ws, &json!({"query": "hiking mountains", "limit": 5}));
        assert!(result.success);
        let data = result.data.unwrap();
        assert_eq!(data[0]["content"], "User likes hiking in mountains");
    }

    #[tokio::test]
    async fn memory_patch_requires_at_least_one_field() {
        let dir = tempdir().unwrap();
        let ws = workspace(dir.path(), true);
        let handlers = handlers();
        let result = handlers.memory_patch(&ws, &json!({"memory_id": "abc"})).await;
        assert!(!result.success);
        assert_eq!(
            result.error.unwrap(),
            "At least one of 'enabled', 'visibility', or 'importance' must be provided"
        );
    }

    #[tokio::test]
    async fn send_reply_rejects_empty_message() {
        let dir = tempdir().unwrap();
        let ws = workspace(dir.path(), true);
        let handlers = handlers();
        let adapter = MockAdapter::new("bot", AdapterCapabilities::default());
        let result = handlers
            .send_reply(&ws, "c1", &adapter, &json!({"message": "   "}))
            .await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap(), "Message cannot be empty");
    }

    #[tokio::test]
    async fn send_reply_second_attempt_rejected() {
        let dir = tempdir().unwrap();
        let ws = workspace(dir.path(), true);
        let handlers = handlers();
        let adapter = MockAdapter::new("bot", AdapterCapabilities::default());
        let first = handlers
            .send_reply(&ws, "c1", &adapter, &json!({"message": "hi"}))
            .await;
        assert!(first.success);
        let second = handlers
            .send_reply(&ws, "c1", &adapter, &json!({"message": "hi again"}))
            .await;
        assert!(!second.success);
        assert_eq!(
            second.error.unwrap(),
            "Reply can only be sent once per interaction"
        );
        assert_eq!(adapter.sent_replies().len(), 1);
    }

    #[tokio::test]
    async fn fetch_context_search_without_capability_rejected() {
        let dir = tempdir().unwrap();
        let ws = workspace(dir.path(), true);
        let handlers = handlers();
        let adapter = MockAdapter::new("bot", AdapterCapabilities::default());
        let result = handlers
            .fetch_context(&ws, "c1", "", "u1", &adapter, &json!({"type": "search_messages", "query": "x"}))
            .await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap(), "Platform does not support message search");
    }

    #[tokio::test]
    async fn fetch_context_user_info_returns_expected_shape() {
        let dir = tempdir().unwrap();
        let ws = workspace(dir.path(), true);
        let handlers = handlers();
        let adapter = MockAdapter::new("bot", AdapterCapabilities::default());
        let result = handlers
            .fetch_context(&ws, "c1", "", "u1", &adapter, &json!({"type": "user_info"}))
            .await;
        assert!(result.success);
        let data = result.data.unwrap();
        assert_eq!(data["userId"], "u1");
        assert_eq!(data["isDm"], true);
    }
}
