//! Session Orchestrator (spec.md §4.9): the per-message pipeline that ties
//! workspace resolution, context assembly, session registration, agent
//! spawn/prompt, and reply dispatch together.

use std::sync::Arc;

use gw_adapter::{PlatformAdapter, ReplyOptions};
use gw_agent_connector::{AgentConnector, PromptOutcome, WorkspaceClient};
use gw_domain::config::AgentConfig;
use gw_domain::types::NormalizedEvent;
use gw_domain::{Error, Result};
use gw_sessions::NewSession;
use gw_skills::SKILL_NAMES;

use crate::state::AppState;

const GENERIC_FAILURE_REPLY: &str =
    "I encountered an issue processing your message. Please try again.";

/// Why an orchestration run ended. Only used for logging/tests — the
/// caller never needs more than "did it succeed".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    ReplySent,
    NoReplyDispatchedApology,
    Cancelled,
    Error(String),
}

/// Runs exactly one normalized event through the full pipeline described
/// in spec.md §4.9. Always tears down the session and connector on the
/// way out, whatever the outcome.
pub async fn orchestrate(
    state: &AppState,
    event: NormalizedEvent,
    adapter: Arc<dyn PlatformAdapter>,
    agent_name: &str,
    agent_config: &AgentConfig,
) -> Result<Outcome> {
    // 1. Resolve workspace; create directory if missing.
    let workspace = state.workspace.get_or_create(&event)?;

    // 2. Assemble context.
    let assembled = state
        .context
        .assemble(&event, &workspace, adapter.as_ref())
        .await?;
    let formatted = state.context.format_for_prompt(&assembled);

    // 3. Build the prompt.
    let skill_list = SKILL_NAMES.join(", ");
    let prompt_text = format!(
        "# System Instructions\n{}\n\n# Context and Message\n{}\n\n# Instructions\n\
         You must end every turn by invoking the 'send-reply' skill exactly once; \
         it is the required terminal skill for this conversation. The other \
         available skills are: {}.",
        formatted.system_message, formatted.user_message, skill_list
    );

    // 4. Register a session.
    let session_id = state.sessions.register(NewSession {
        platform: event.platform.clone(),
        channel_id: event.channel_id.clone(),
        user_id: event.user_id.clone(),
        workspace: workspace.clone(),
        timeout_ms: state.config.sessions.timeout_ms,
    });

    // 5. Construct an agent connector, connect, create session, set model.
    let credential = agent_config.resolve_credential().map_err(Error::Config)?;
    let extra_env = vec![(agent_config.credential_env.clone(), credential)];

    let client = Arc::new(WorkspaceClient::new(
        workspace.clone(),
        state.workspace.clone(),
        state.config.skills.dir.clone(),
        state.config.skills.gateway_script_path.clone(),
    ));

    let connector = AgentConnector::spawn(
        &agent_config.command,
        &agent_config.args,
        &workspace.path,
        &extra_env,
        client,
        workspace.key.clone(),
    );

    let connector = match connector {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(session_id = %session_id, error = %e, "failed to spawn agent subprocess");
            state.sessions.remove(&session_id);
            dispatch_apology(state, &workspace.key, &event.channel_id, adapter.as_ref()).await;
            return Ok(Outcome::Error(e.to_string()));
        }
    };

    gw_domain::trace::TraceEvent::AgentSpawned {
        session_id: session_id.clone(),
        command: agent_config.command.clone(),
    }
    .emit();

    // Clear any pre-existing reply-state for this (workspace, channel) so a
    // prior session's single-reply guard doesn't leak into this one.
    state.reply_state.clear(&workspace.key, &event.channel_id);

    let outcome = run_prompt(&connector, &workspace.path, &session_id, agent_name, &prompt_text).await;

    connector.disconnect().await;
    gw_domain::trace::TraceEvent::AgentDisconnected {
        session_id: session_id.clone(),
        reason: format!("{outcome:?}"),
    }
    .emit();

    let reply_already_sent =
        state.reply_state.has_sent(&workspace.key, &event.channel_id) || state.sessions.has_reply_sent(&session_id);

    let final_outcome = match outcome {
        Ok(PromptOutcome::Cancelled) => Outcome::Cancelled,
        Ok(_) if reply_already_sent => Outcome::ReplySent,
        Ok(_) => {
            dispatch_apology(state, &workspace.key, &event.channel_id, adapter.as_ref()).await;
            Outcome::NoReplyDispatchedApology
        }
        Err(e) => {
            tracing::error!(session_id = %session_id, error = %e, "agent prompt failed");
            if !reply_already_sent {
                dispatch_apology(state, &workspace.key, &event.channel_id, adapter.as_ref()).await;
            }
            Outcome::Error(e.to_string())
        }
    };

    // 7. Always remove the session.
    state.sessions.remove(&session_id);

    Ok(final_outcome)
}

async fn run_prompt(
    connector: &AgentConnector,
    cwd: &std::path::Path,
    session_id: &str,
    agent_name: &str,
    prompt_text: &str,
) -> Result<PromptOutcome> {
    let agent_caps = connector.initialize().await?;
    let acp_session_id = connector.new_session(cwd, Vec::new(), &agent_caps).await?;
    connector.set_session_model(&acp_session_id, agent_name).await?;

    tracing::debug!(session_id = %session_id, acp_session_id = %acp_session_id, "agent session established");

    connector.prompt(&acp_session_id, prompt_text).await
}

/// Dispatches the generic user-visible apology, unless a reply was already
/// sent for this (workspace, channel) — callers check that before calling.
async fn dispatch_apology(
    state: &AppState,
    workspace_key: &str,
    channel_id: &str,
    adapter: &dyn PlatformAdapter,
) {
    if state.reply_state.has_sent(workspace_key, channel_id) {
        return;
    }
    if let Err(e) = adapter
        .send_reply(channel_id, GENERIC_FAILURE_REPLY, ReplyOptions::default())
        .await
    {
        tracing::warn!(workspace = %workspace_key, error = %e, "failed to dispatch apology reply");
        return;
    }
    state.reply_state.mark_sent(workspace_key, channel_id);
}
