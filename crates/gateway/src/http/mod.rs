//! Skill HTTP Gateway (spec.md §4.7): the localhost-only surface
//! externally-spawned skill scripts call into. Single route shape,
//! `POST /api/skill/{name}`, answering with `{success, data?, error?}` per
//! the status-code table below.

use axum::extract::{Path, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SkillRequest {
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub parameters: Value,
}

/// Builds the gateway's axum router: one POST route plus CORS permitting a
/// localhost origin and the two methods this surface ever sees.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any)
        .allow_origin(HeaderValue::from_static("http://localhost"));

    Router::new()
        .route(
            "/api/skill/:name",
            post(handle_skill)
                .options(handle_options)
                .fallback(method_not_allowed),
        )
        .layer(cors)
        .with_state(state)
        .fallback(not_found)
}

async fn handle_options() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

fn envelope(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

fn error_envelope(status: StatusCode, message: impl Into<String>) -> Response {
    envelope(status, json!({"success": false, "error": message.into()}))
}

async fn not_found() -> Response {
    error_envelope(StatusCode::NOT_FOUND, "Not found")
}

/// A skill name must match `[a-z-]+` — axum's router already gives us a
/// non-empty path segment, so this only rejects characters outside that
/// set.
fn is_valid_skill_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_lowercase() || c == '-')
}

async fn handle_skill(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Result<Json<SkillRequest>, axum::extract::rejection::JsonRejection>,
) -> Response {
    if !is_valid_skill_name(&name) {
        return error_envelope(StatusCode::NOT_FOUND, "Not found");
    }

    let Json(request) = match body {
        Ok(json) => json,
        Err(_) => return error_envelope(StatusCode::BAD_REQUEST, "Missing sessionId"),
    };

    let Some(session_id) = request.session_id.filter(|s| !s.is_empty()) else {
        return error_envelope(StatusCode::BAD_REQUEST, "Missing sessionId");
    };

    let Some(session) = state.sessions.get(&session_id) else {
        return error_envelope(StatusCode::UNAUTHORIZED, "Invalid or expired session");
    };

    if !gw_skills::SKILL_NAMES.contains(&name.as_str()) {
        return error_envelope(StatusCode::NOT_FOUND, format!("Unknown skill: {name}"));
    }

    if name == "send-reply" && session.reply_sent() {
        return error_envelope(StatusCode::CONFLICT, "Reply already sent for this session");
    }

    let adapter = state.adapters.get(&session.platform);

    let result = match name.as_str() {
        "memory-save" => state.skills.memory_save(&session.workspace, &request.parameters).await,
        "memory-search" => state.skills.memory_search(&session.workspace, &request.parameters),
        "memory-patch" => state.skills.memory_patch(&session.workspace, &request.parameters).await,
        "send-reply" => {
            let Some(adapter) = adapter else {
                return error_envelope(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("no adapter connected for platform '{}'", session.platform),
                );
            };
            state
                .skills
                .send_reply(&session.workspace, &session.channel_id, adapter.as_ref(), &request.parameters)
                .await
        }
        "fetch-context" => {
            let Some(adapter) = adapter else {
                return error_envelope(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("no adapter connected for platform '{}'", session.platform),
                );
            };
            state
                .skills
                .fetch_context(
                    &session.workspace,
                    &session.channel_id,
                    "",
                    &session.user_id,
                    adapter.as_ref(),
                    &request.parameters,
                )
                .await
        }
        _ => unreachable!("name already checked against SKILL_NAMES"),
    };

    if result.success && name == "send-reply" {
        state.sessions.mark_reply_sent(&session_id);
    }

    let status = if result.success { StatusCode::OK } else { StatusCode::BAD_REQUEST };
    envelope(status, serde_json::to_value(&result).unwrap_or_else(|_| json!({"success": false})))
}

/// Explicit 405 for any method this router doesn't recognize on the skill
/// path (axum's default `MethodNotAllowed` would already do this, but the
/// literal body text is part of the contract).
pub async fn method_not_allowed() -> Response {
    error_envelope(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skill_name_pattern_accepts_lowercase_and_dash() {
        assert!(is_valid_skill_name("send-reply"));
        assert!(is_valid_skill_name("memory-save"));
    }

    #[test]
    fn skill_name_pattern_rejects_upper_and_digits() {
        assert!(!is_valid_skill_name("Send-Reply"));
        assert!(!is_valid_skill_name("skill1"));
        assert!(!is_valid_skill_name(""));
    }
}
