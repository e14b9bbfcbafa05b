//! Client-role callbacks: handlers for the requests and notifications the
//! agent subprocess sends *to us* (`requestPermission`, `sessionUpdate`,
//! `readTextFile`, `writeTextFile`). Grounded on the same request/response
//! shape the stdio transport speaks one direction, generalized to the
//! reverse direction the Agent Client Protocol also requires.

use std::sync::Arc;

use async_trait::async_trait;
use gw_domain::types::Workspace;
use gw_workspace::WorkspaceManager;
use serde_json::Value;
use tokio::io::AsyncReadExt;

use crate::acp::{
    tool_call_skill_name, PermissionOutcome, ReadTextFileParams, ReadTextFileResult,
    RequestPermissionParams, RequestPermissionResult, SessionUpdateParams, WriteTextFileParams,
    WriteTextFileResult,
};
use crate::protocol::{JsonRpcError, CODE_ACCESS_DENIED};

/// The client half of the bidirectional protocol. One implementation per
/// connected session, bound to that session's workspace.
#[async_trait]
pub trait ClientCallbacks: Send + Sync {
    async fn request_permission(
        &self,
        params: RequestPermissionParams,
    ) -> RequestPermissionResult;

    fn session_update(&self, params: SessionUpdateParams);

    async fn read_text_file(
        &self,
        params: ReadTextFileParams,
    ) -> Result<ReadTextFileResult, JsonRpcError>;

    async fn write_text_file(
        &self,
        params: WriteTextFileParams,
    ) -> Result<WriteTextFileResult, JsonRpcError>;
}

/// The one `ClientCallbacks` implementation this gateway ships: enforces
/// the workspace boundary on file access and auto-approves exactly the
/// three tool-call shapes spec.md §4.8 allows.
pub struct WorkspaceClient {
    workspace: Workspace,
    workspace_manager: Arc<WorkspaceManager>,
    skills_dir: std::path::PathBuf,
    gateway_script_path: std::path::PathBuf,
}

impl WorkspaceClient {
    pub fn new(
        workspace: Workspace,
        workspace_manager: Arc<WorkspaceManager>,
        skills_dir: std::path::PathBuf,
        gateway_script_path: std::path::PathBuf,
    ) -> Self {
        Self {
            workspace,
            workspace_manager,
            skills_dir,
            gateway_script_path,
        }
    }

    fn names_registered_skill(&self, name: Option<&str>) -> bool {
        match name {
            Some(name) => gw_skills::SKILL_NAMES.contains(&name),
            None => false,
        }
    }

    fn is_read_under_skills_dir(&self, raw_input: &Value) -> bool {
        let Some(path) = raw_input.get("path").and_then(Value::as_str) else {
            return false;
        };
        self.skills_dir
            .canonicalize()
            .ok()
            .zip(std::path::Path::new(path).canonicalize().ok())
            .map(|(dir, target)| target.starts_with(dir))
            .unwrap_or(false)
    }

    /// True when every command token in a shell tool call's raw input
    /// references our own skill script, never anything else.
    fn is_shell_call_to_gateway_script(&self, raw_input: &Value) -> bool {
        let script = self.gateway_script_path.to_string_lossy();
        let commands: Vec<&str> = match raw_input.get("command").and_then(Value::as_str) {
            Some(single) => vec![single],
            None => match raw_input.get("commands").and_then(Value::as_array) {
                Some(list) => list.iter().filter_map(Value::as_str).collect(),
                None => return false,
            },
        };
        !commands.is_empty() && commands.iter().all(|c| c.contains(script.as_ref()))
    }
}

#[async_trait]
impl ClientCallbacks for WorkspaceClient {
    async fn request_permission(
        &self,
        params: RequestPermissionParams,
    ) -> RequestPermissionResult {
        let skill_name = tool_call_skill_name(&params.tool_call);
        let approved = self.names_registered_skill(skill_name.as_deref())
            || self.is_read_under_skills_dir(&params.tool_call.raw_input)
            || self.is_shell_call_to_gateway_script(&params.tool_call.raw_input);

        if approved {
            let option_id = params
                .options
                .first()
                .map(|o| o.option_id.clone())
                .unwrap_or_else(|| "allow".to_string());
            RequestPermissionResult {
                outcome: PermissionOutcome::Selected { option_id },
            }
        } else {
            tracing::warn!(
                workspace = %self.workspace.key,
                tool_call_id = %params.tool_call.tool_call_id,
                "denied permission request: not a recognized skill, skills-dir read, or gateway script invocation"
            );
            RequestPermissionResult {
                outcome: PermissionOutcome::Cancelled,
            }
        }
    }

    fn session_update(&self, params: SessionUpdateParams) {
        let kind = params
            .update
            .get("sessionUpdate")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        match kind {
            "tool_call" | "tool_call_update" => {
                let status = params.update.get("status").and_then(Value::as_str);
                if status == Some("failed") {
                    tracing::error!(
                        session_id = %params.session_id,
                        tool_call_id = ?params.update.get("toolCallId"),
                        status = ?status,
                        "tool call failed"
                    );
                } else {
                    tracing::debug!(session_id = %params.session_id, kind, ?status, "tool call update");
                }
            }
            _ => {
                tracing::debug!(session_id = %params.session_id, kind, "session update");
            }
        }
    }

    async fn read_text_file(
        &self,
        params: ReadTextFileParams,
    ) -> Result<ReadTextFileResult, JsonRpcError> {
        let resolved = self
            .workspace_manager
            .validate_inside(&self.workspace, std::path::Path::new(&params.path))
            .map_err(|e| JsonRpcError {
                code: CODE_ACCESS_DENIED,
                message: format!("access denied: {e}"),
                data: None,
            })?;

        let mut content = tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|e| JsonRpcError {
                code: CODE_ACCESS_DENIED,
                message: format!("cannot read {}: {e}", resolved.display()),
                data: None,
            })?;

        if let Some(line) = params.line {
            let start = (line.saturating_sub(1)) as usize;
            let limit = params.limit.map(|l| l as usize);
            content = content
                .lines()
                .skip(start)
                .take(limit.unwrap_or(usize::MAX))
                .collect::<Vec<_>>()
                .join("\n");
        }

        Ok(ReadTextFileResult { content })
    }

    async fn write_text_file(
        &self,
        params: WriteTextFileParams,
    ) -> Result<WriteTextFileResult, JsonRpcError> {
        if !lexically_inside(&params.path) {
            return Err(JsonRpcError {
                code: CODE_ACCESS_DENIED,
                message: format!("access denied: {} escapes the workspace", params.path),
                data: None,
            });
        }

        let target = self.workspace.path.join(&params.path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| JsonRpcError {
                code: CODE_ACCESS_DENIED,
                message: format!("cannot create {}: {e}", parent.display()),
                data: None,
            })?;
        }
        tokio::fs::write(&target, &params.content)
            .await
            .map_err(|e| JsonRpcError {
                code: CODE_ACCESS_DENIED,
                message: format!("cannot write {}: {e}", target.display()),
                data: None,
            })?;

        // Re-check post-write: a symlinked parent directory could still have
        // routed the write outside the workspace despite the lexical check.
        if let Err(e) = self
            .workspace_manager
            .validate_inside(&self.workspace, std::path::Path::new(&params.path))
        {
            let _ = tokio::fs::remove_file(&target).await;
            return Err(JsonRpcError {
                code: CODE_ACCESS_DENIED,
                message: format!("access denied: {e}"),
                data: None,
            });
        }

        Ok(WriteTextFileResult {})
    }
}

/// Rejects a relative path that climbs above the workspace root via `..`
/// before any filesystem access happens. This is a cheap first gate;
/// [`WorkspaceManager::validate_inside`] still does the authoritative
/// symlink-aware check once the target exists.
fn lexically_inside(path: &str) -> bool {
    use std::path::Component;
    if std::path::Path::new(path).is_absolute() {
        return false;
    }
    let mut depth: i64 = 0;
    for component in std::path::Path::new(path).components() {
        match component {
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    true
}

/// Reads stderr from the subprocess to completion, logging each line as a
/// warning. Never applies backpressure to the protocol stream.
pub async fn drain_stderr<R>(mut stderr: R, workspace_key: String)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if stderr.read_to_end(&mut buf).await.is_ok() {
        for line in String::from_utf8_lossy(&buf).lines() {
            if !line.trim().is_empty() {
                tracing::warn!(workspace = %workspace_key, agent_stderr = %line);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gw_domain::types::WorkspaceComponents;
    use serde_json::json;
    use tempfile::tempdir;

    fn workspace(dir: &std::path::Path) -> Workspace {
        Workspace {
            key: "discord/u1/c1".into(),
            path: dir.to_path_buf(),
            is_dm: true,
            components: WorkspaceComponents {
                platform: "discord".into(),
                user_id: "u1".into(),
                channel_id: "c1".into(),
            },
        }
    }

    fn client(dir: &std::path::Path) -> WorkspaceClient {
        WorkspaceClient::new(
            workspace(dir),
            Arc::new(WorkspaceManager::new(&gw_domain::config::WorkspaceConfig {
                repo_root: dir.to_path_buf(),
                workspaces_dir: "workspaces".into(),
            })),
            dir.join("skills"),
            dir.join("skills/skill-gateway.sh"),
        )
    }

    fn tool_call(raw_input: Value, title: &str) -> RequestPermissionParams {
        RequestPermissionParams {
            session_id: "s1".into(),
            tool_call: crate::acp::ToolCallInfo {
                tool_call_id: "t1".into(),
                title: title.into(),
                kind: None,
                raw_input,
            },
            options: vec![crate::acp::PermissionOption {
                option_id: "allow".into(),
                kind: None,
            }],
        }
    }

    #[tokio::test]
    async fn approves_registered_skill_name() {
        let dir = tempdir().unwrap();
        let c = client(dir.path());
        let result = c
            .request_permission(tool_call(json!({"skill": "memory-save"}), "anything"))
            .await;
        assert!(matches!(result.outcome, PermissionOutcome::Selected { .. }));
    }

    #[tokio::test]
    async fn denies_unknown_tool_call() {
        let dir = tempdir().unwrap();
        let c = client(dir.path());
        let result = c
            .request_permission(tool_call(json!({}), "delete everything"))
            .await;
        assert!(matches!(result.outcome, PermissionOutcome::Cancelled));
    }

    #[tokio::test]
    async fn approves_shell_call_to_gateway_script() {
        let dir = tempdir().unwrap();
        let c = client(dir.path());
        let script = dir.path().join("skills/skill-gateway.sh");
        let result = c
            .request_permission(tool_call(
                json!({"command": format!("{} memory-search", script.display())}),
                "run script",
            ))
            .await;
        assert!(matches!(result.outcome, PermissionOutcome::Selected { .. }));
    }

    #[tokio::test]
    async fn denies_shell_call_mixing_other_commands() {
        let dir = tempdir().unwrap();
        let c = client(dir.path());
        let script = dir.path().join("skills/skill-gateway.sh");
        let result = c
            .request_permission(tool_call(
                json!({"commands": [script.display().to_string(), "rm -rf /"]}),
                "run script",
            ))
            .await;
        assert!(matches!(result.outcome, PermissionOutcome::Cancelled));
    }

    #[tokio::test]
    async fn write_then_read_text_file_roundtrips() {
        let dir = tempdir().unwrap();
        let c = client(dir.path());
        c.write_text_file(WriteTextFileParams {
            session_id: "s1".into(),
            path: "notes.txt".into(),
            content: "hello".into(),
        })
        .await
        .unwrap();

        let result = c
            .read_text_file(ReadTextFileParams {
                session_id: "s1".into(),
                path: "notes.txt".into(),
                line: None,
                limit: None,
            })
            .await
            .unwrap();
        assert_eq!(result.content, "hello");
    }

    #[tokio::test]
    async fn read_text_file_rejects_escape() {
        let dir = tempdir().unwrap();
        let outside = dir.path().parent().unwrap().join("gw_test_outside.txt");
        std::fs::write(&outside, b"nope").unwrap();
        let c = client(dir.path());
        let result = c
            .read_text_file(ReadTextFileParams {
                session_id: "s1".into(),
                path: "../gw_test_outside.txt".into(),
                line: None,
                limit: None,
            })
            .await;
        assert!(result.is_err());
        let _ = std::fs::remove_file(&outside);
    }
}
