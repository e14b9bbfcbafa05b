//! Owns the subprocess and the newline-delimited JSON-RPC duplex. One
//! [`AgentConnector`] is constructed per session: spawn, `initialize`,
//! `newSession`, `setSessionModel`, `prompt`, then `disconnect`.
//!
//! Generalizes the teacher's single-direction MCP stdio transport (one
//! pending request at a time, request lock serializing whole cycles) to a
//! bidirectional protocol: many of our own requests can be in flight while
//! the child concurrently calls back into us.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gw_domain::{Error, Result};
use parking_lot::Mutex as SyncMutex;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex as AsyncMutex};

use crate::acp::{
    AgentCapabilities, CancelParams, ClientCapabilities, InitializeParams, NewSessionParams,
    PromptOutcome, PromptParams, ReadTextFileParams, RequestPermissionParams,
    SessionUpdateParams, SetSessionModelParams, ToolServerRef, ToolServerTransport,
    WriteTextFileParams,
};
use crate::client::ClientCallbacks;
use crate::protocol::{
    parse_incoming, IncomingMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    CODE_INTERNAL_ERROR,
};

/// How long `disconnect` waits after closing stdin before giving up and
/// killing the process outright.
const DISCONNECT_DEADLINE: Duration = Duration::from_secs(2);
/// How long an outgoing request waits for a matching response before the
/// whole connection is considered dead.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

type PendingMap = SyncMutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>;

type SharedStdin = Arc<AsyncMutex<Box<dyn AsyncWrite + Unpin + Send>>>;

pub struct AgentConnector {
    stdin: SharedStdin,
    pending: Arc<PendingMap>,
    next_id: AtomicU64,
    child: Option<AsyncMutex<Child>>,
    alive: AtomicBool,
    workspace_key: String,
}

impl AgentConnector {
    /// Spawns `command` with `args`, cwd set to the workspace path, PATH and
    /// HOME inherited from this process plus `extra_env` (the resolved
    /// per-agent credential).
    pub fn spawn(
        command: &str,
        args: &[String],
        cwd: &std::path::Path,
        extra_env: &[(String, String)],
        client: Arc<dyn ClientCallbacks>,
        workspace_key: String,
    ) -> Result<Self> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .current_dir(cwd)
            .env_clear()
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        for key in ["PATH", "HOME"] {
            if let Ok(value) = std::env::var(key) {
                cmd.env(key, value);
            }
        }
        for (key, value) in extra_env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(Error::Io)?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Agent("failed to capture child stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Agent("failed to capture child stdout".into()))?;
        let stderr = child.stderr.take();

        let connector = Self::start(
            Box::new(stdin),
            Box::new(stdout),
            Some(AsyncMutex::new(child)),
            client,
            workspace_key,
        );

        if let Some(stderr) = stderr {
            let workspace_key = connector.workspace_key.clone();
            tokio::spawn(crate::client::drain_stderr(stderr, workspace_key));
        }

        Ok(connector)
    }

    /// Test-only constructor: wires the connector to an in-memory duplex
    /// pair instead of a real subprocess, so the protocol loop and callback
    /// dispatch can be exercised without ever spawning a child.
    pub fn from_duplex(
        read_half: impl AsyncRead + Unpin + Send + 'static,
        write_half: impl AsyncWrite + Unpin + Send + 'static,
        client: Arc<dyn ClientCallbacks>,
        workspace_key: String,
    ) -> Self {
        Self::start(Box::new(write_half), Box::new(read_half), None, client, workspace_key)
    }

    fn start(
        stdin: Box<dyn AsyncWrite + Unpin + Send>,
        stdout: Box<dyn AsyncRead + Unpin + Send>,
        child: Option<AsyncMutex<Child>>,
        client: Arc<dyn ClientCallbacks>,
        workspace_key: String,
    ) -> Self {
        let stdin: SharedStdin = Arc::new(AsyncMutex::new(stdin));
        let pending: Arc<PendingMap> = Arc::new(SyncMutex::new(HashMap::new()));

        let reply_writer = ReplyWriter { stdin: stdin.clone() };
        tokio::spawn(reader_loop(stdout, pending.clone(), client, reply_writer, workspace_key.clone()));

        Self {
            stdin,
            pending,
            next_id: AtomicU64::new(1),
            child,
            alive: AtomicBool::new(true),
            workspace_key,
        }
    }

    pub async fn initialize(&self) -> Result<AgentCapabilities> {
        let params = InitializeParams {
            client_capabilities: ClientCapabilities::default(),
            ..InitializeParams::default()
        };
        let result = self
            .call("initialize", serde_json::to_value(params).map_err(Error::Json)?)
            .await?;
        Ok(AgentCapabilities::from_initialize_result(&result))
    }

    pub async fn new_session(
        &self,
        cwd: &std::path::Path,
        tool_servers: Vec<ToolServerRef>,
        agent_caps: &AgentCapabilities,
    ) -> Result<String> {
        validate_tool_servers(&tool_servers, agent_caps)?;
        let params = NewSessionParams {
            cwd: cwd.display().to_string(),
            mcp_servers: tool_servers,
        };
        let result = self
            .call("newSession", serde_json::to_value(params).map_err(Error::Json)?)
            .await?;
        result
            .get("sessionId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::Agent("newSession response missing sessionId".into()))
    }

    pub async fn set_session_model(&self, session_id: &str, model_id: &str) -> Result<()> {
        let params = SetSessionModelParams {
            session_id: session_id.to_string(),
            model_id: model_id.to_string(),
        };
        self.call("setSessionModel", serde_json::to_value(params).map_err(Error::Json)?)
            .await?;
        Ok(())
    }

    pub async fn prompt(&self, session_id: &str, text: &str) -> Result<PromptOutcome> {
        let params = PromptParams {
            session_id: session_id.to_string(),
            prompt: vec![crate::acp::ContentBlock::text(text)],
        };
        let result = self.call("prompt", serde_json::to_value(params).map_err(Error::Json)?).await?;
        Ok(PromptOutcome::from_result(&result))
    }

    /// Sends `cancel` and returns immediately without waiting for the
    /// in-flight `prompt` call to resolve.
    pub async fn cancel(&self, session_id: &str) -> Result<()> {
        let params = CancelParams {
            session_id: session_id.to_string(),
        };
        let notification = JsonRpcNotification::new("cancel", Some(serde_json::to_value(params).map_err(Error::Json)?));
        self.write_line(&serde_json::to_string(&notification).map_err(Error::Json)?).await
    }

    /// Closes stdin, sends SIGTERM, waits up to [`DISCONNECT_DEADLINE`] for
    /// exit, then SIGKILLs the process if it hasn't. Errors during teardown
    /// are logged, never propagated.
    pub async fn disconnect(&self) {
        self.alive.store(false, Ordering::SeqCst);
        {
            let mut stdin = self.stdin.lock().await;
            if let Err(e) = stdin.shutdown().await {
                tracing::debug!(workspace = %self.workspace_key, error = %e, "error closing agent stdin");
            }
        }

        let Some(child_lock) = &self.child else { return };
        let mut child = child_lock.lock().await;

        if let Some(pid) = child.id() {
            if let Err(e) = send_sigterm(pid) {
                tracing::warn!(workspace = %self.workspace_key, error = %e, "failed to send SIGTERM to agent process");
            }
        }

        match tokio::time::timeout(DISCONNECT_DEADLINE, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(workspace = %self.workspace_key, ?status, "agent process exited");
            }
            Ok(Err(e)) => {
                tracing::warn!(workspace = %self.workspace_key, error = %e, "error waiting for agent process");
            }
            Err(_) => {
                tracing::warn!(workspace = %self.workspace_key, "agent process did not exit in time, killing");
                if let Err(e) = child.kill().await {
                    tracing::warn!(workspace = %self.workspace_key, error = %e, "failed to kill agent process");
                }
            }
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(Error::Agent("connector is disconnected".into()));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        let request = JsonRpcRequest::new(id, method, Some(params));
        let line = serde_json::to_string(&request).map_err(Error::Json)?;
        if let Err(e) = self.write_line(&line).await {
            self.pending.lock().remove(&id);
            return Err(e);
        }

        let response = tokio::time::timeout(REQUEST_TIMEOUT, rx).await.map_err(|_| {
            self.pending.lock().remove(&id);
            Error::Agent(format!("timed out waiting for {method} response"))
        })?;
        let response = response.map_err(|_| Error::Agent(format!("{method} channel closed before response")))?;

        if let Some(error) = response.error {
            return Err(Error::Agent(error.to_string()));
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    async fn write_line(&self, line: &str) -> Result<()> {
        let mut stdin = self.stdin.lock().await;
        stdin.write_all(line.as_bytes()).await.map_err(Error::Io)?;
        stdin.write_all(b"\n").await.map_err(Error::Io)?;
        stdin.flush().await.map_err(Error::Io)
    }
}

/// A cheap clone of stdin access handed to the reader task so it can answer
/// `requestPermission`/`readTextFile`/`writeTextFile` without a back
/// reference into `AgentConnector` itself.
#[derive(Clone)]
struct ReplyWriter {
    stdin: Arc<AsyncMutex<Box<dyn AsyncWrite + Unpin + Send>>>,
}

impl ReplyWriter {
    async fn send(&self, value: &impl serde::Serialize) {
        let Ok(line) = serde_json::to_string(value) else { return };
        let mut stdin = self.stdin.lock().await;
        let _ = stdin.write_all(line.as_bytes()).await;
        let _ = stdin.write_all(b"\n").await;
        let _ = stdin.flush().await;
    }
}

async fn reader_loop(
    stdout: Box<dyn AsyncRead + Unpin + Send>,
    pending: Arc<PendingMap>,
    client: Arc<dyn ClientCallbacks>,
    replies: ReplyWriter,
    workspace_key: String,
) {
    let mut reader = BufReader::new(stdout);
    loop {
        let mut line = String::new();
        let bytes_read = match reader.read_line(&mut line).await {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(workspace = %workspace_key, error = %e, "agent stdout read error");
                break;
            }
        };
        if bytes_read == 0 {
            tracing::debug!(workspace = %workspace_key, "agent stdout closed");
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match parse_incoming(trimmed) {
            Some(IncomingMessage::Response(response)) => {
                if let Some(id) = response.id.as_u64() {
                    if let Some(tx) = pending.lock().remove(&id) {
                        let _ = tx.send(response);
                    }
                }
            }
            Some(IncomingMessage::Notification(notification)) => {
                handle_notification(&notification, &client, &workspace_key);
            }
            Some(IncomingMessage::Request(request)) => {
                handle_request(request, &client, &replies, &workspace_key).await;
            }
            None => {
                tracing::debug!(workspace = %workspace_key, line = %trimmed, "skipping unrecognized line from agent");
            }
        }
    }
}

fn handle_notification(notification: &JsonRpcNotification, client: &Arc<dyn ClientCallbacks>, workspace_key: &str) {
    if notification.method != "sessionUpdate" {
        tracing::debug!(workspace = %workspace_key, method = %notification.method, "unhandled notification");
        return;
    }
    let Some(params) = notification.params.clone() else { return };
    match serde_json::from_value::<SessionUpdateParams>(params) {
        Ok(update) => client.session_update(update),
        Err(e) => tracing::warn!(workspace = %workspace_key, error = %e, "malformed sessionUpdate"),
    }
}

async fn handle_request(
    request: JsonRpcRequest,
    client: &Arc<dyn ClientCallbacks>,
    replies: &ReplyWriter,
    workspace_key: &str,
) {
    let id = request.id.clone();
    let params = request.params.unwrap_or(Value::Null);

    match request.method.as_str() {
        "requestPermission" => match serde_json::from_value::<RequestPermissionParams>(params) {
            Ok(p) => {
                let result = client.request_permission(p).await;
                replies.send(&JsonRpcResponse::ok(id, serde_json::json!(result))).await;
            }
            Err(e) => {
                replies
                    .send(&JsonRpcResponse::err(id, CODE_INTERNAL_ERROR, format!("malformed requestPermission: {e}")))
                    .await;
            }
        },
        "readTextFile" => match serde_json::from_value::<ReadTextFileParams>(params) {
            Ok(p) => match client.read_text_file(p).await {
                Ok(result) => replies.send(&JsonRpcResponse::ok(id, serde_json::json!(result))).await,
                Err(err) => replies.send(&JsonRpcResponse::err(id, err.code, err.message)).await,
            },
            Err(e) => {
                replies
                    .send(&JsonRpcResponse::err(id, CODE_INTERNAL_ERROR, format!("malformed readTextFile: {e}")))
                    .await;
            }
        },
        "writeTextFile" => match serde_json::from_value::<WriteTextFileParams>(params) {
            Ok(p) => match client.write_text_file(p).await {
                Ok(result) => replies.send(&JsonRpcResponse::ok(id, serde_json::json!(result))).await,
                Err(err) => replies.send(&JsonRpcResponse::err(id, err.code, err.message)).await,
            },
            Err(e) => {
                replies
                    .send(&JsonRpcResponse::err(id, CODE_INTERNAL_ERROR, format!("malformed writeTextFile: {e}")))
                    .await;
            }
        },
        other => {
            tracing::warn!(workspace = %workspace_key, method = %other, "unsupported client-role request from agent");
            replies
                .send(&JsonRpcResponse::err(id, CODE_INTERNAL_ERROR, format!("unsupported method: {other}")))
                .await;
        }
    }
}

/// Sends SIGTERM to the child's pid, asking it to shut down gracefully
/// before the hard-kill fallback in `disconnect`'s timeout branch.
#[cfg(unix)]
fn send_sigterm(pid: u32) -> std::io::Result<()> {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), nix::sys::signal::Signal::SIGTERM)
        .map_err(|e| std::io::Error::from_raw_os_error(e as i32))
}

#[cfg(not(unix))]
fn send_sigterm(_pid: u32) -> std::io::Result<()> {
    Ok(())
}

/// Rejects a co-spawned tool server whose transport the agent never
/// advertised support for.
pub fn validate_tool_servers(servers: &[ToolServerRef], caps: &AgentCapabilities) -> Result<()> {
    for server in servers {
        let supported = match server.transport {
            ToolServerTransport::Stdio => caps.mcp_stdio,
            ToolServerTransport::Http => caps.mcp_http,
        };
        if !supported {
            return Err(Error::Agent(format!(
                "agent does not support {:?} tool servers, rejecting '{}'",
                server.transport, server.name
            )));
        }
    }
    Ok(())
}
