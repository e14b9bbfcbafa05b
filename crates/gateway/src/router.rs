//! Event Router / Message Handler (spec.md §4.10): in-process dedupe of
//! concurrent `{platform}:{message_id}` keys, plus simple predicate-based
//! routes over a default handler that invokes the orchestrator.
//!
//! Grounded on the teacher's `api::inbound::DedupeStore`: a
//! `parking_lot::Mutex<HashMap<key, Instant>>` with TTL-based lazy
//! eviction. Generalized from idempotent-retry suppression (any two
//! deliveries of the same event_id are the same turn) to concurrent-only
//! suppression. A duplicate is rejected only while the first is still
//! in-flight; a platform message id can legitimately recur after the
//! session ends and the key is released.

use std::collections::HashSet;
use std::sync::Arc;

use gw_adapter::PlatformAdapter;
use gw_domain::config::AgentConfig;
use gw_domain::types::NormalizedEvent;
use parking_lot::Mutex;

use crate::orchestrator::{self, Outcome};
use crate::state::AppState;

/// A predicate-based route: the first route whose predicate matches an
/// event decides whether the event is admitted at all. The default route
/// (predicate always true) invokes the orchestrator; others can veto.
pub type RoutePredicate = Box<dyn Fn(&NormalizedEvent) -> bool + Send + Sync>;

pub struct Route {
    pub name: String,
    pub predicate: RoutePredicate,
    pub admit: bool,
}

/// Guards against two concurrent orchestrations for the same
/// `{platform}:{message_id}` key. Not an idempotency cache: released as
/// soon as the in-flight orchestration finishes, so the same message id
/// is free to route again afterward. This only rejects true concurrent
/// duplicates, e.g. a platform webhook retry that arrives mid-turn.
pub struct EventRouter {
    active: Mutex<HashSet<String>>,
    routes: Vec<Route>,
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRouter {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(HashSet::new()),
            routes: Vec::new(),
        }
    }

    /// Appends a route. Routes are evaluated in insertion order; the first
    /// whose predicate matches decides admission.
    pub fn with_route(mut self, name: impl Into<String>, admit: bool, predicate: RoutePredicate) -> Self {
        self.routes.push(Route {
            name: name.into(),
            predicate,
            admit,
        });
        self
    }

    fn dedupe_key(event: &NormalizedEvent) -> String {
        format!("{}:{}", event.platform, event.message_id)
    }

    /// `true` if this event is a concurrent duplicate and must be rejected
    /// without side effects.
    fn try_admit(&self, key: &str) -> bool {
        self.active.lock().insert(key.to_string())
    }

    fn release(&self, key: &str) {
        self.active.lock().remove(key);
    }

    fn route_admits(&self, event: &NormalizedEvent) -> bool {
        for route in &self.routes {
            if (route.predicate)(event) {
                return route.admit;
            }
        }
        true
    }

    /// Dispatches one event: concurrent-dedupe, route predicates, then the
    /// orchestrator. Always releases the dedupe key on the way out.
    pub async fn dispatch(
        &self,
        state: &AppState,
        event: NormalizedEvent,
        adapter: Arc<dyn PlatformAdapter>,
        agent_name: &str,
        agent_config: &AgentConfig,
    ) -> DispatchOutcome {
        let key = Self::dedupe_key(&event);
        if !self.try_admit(&key) {
            tracing::debug!(key = %key, "rejected concurrent duplicate event");
            return DispatchOutcome::DuplicateRejected;
        }

        if !self.route_admits(&event) {
            self.release(&key);
            tracing::debug!(key = %key, "event rejected by route predicate");
            return DispatchOutcome::RouteRejected;
        }

        let result = orchestrator::orchestrate(state, event, adapter, agent_name, agent_config).await;
        self.release(&key);

        match result {
            Ok(outcome) => DispatchOutcome::Orchestrated(outcome),
            Err(e) => {
                tracing::error!(error = %e, "orchestrator returned an error outside its own Result handling");
                DispatchOutcome::Orchestrated(Outcome::Error(e.to_string()))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    DuplicateRejected,
    RouteRejected,
    Orchestrated(Outcome),
}

/// A route admitting only direct messages, for adapters configured to
/// respond to DMs but ignore guild traffic absent a mention.
pub fn dm_only_route() -> RoutePredicate {
    Box::new(|event: &NormalizedEvent| event.is_dm)
}

/// A route admitting only events from a specific platform.
pub fn platform_route(platform: impl Into<String>) -> RoutePredicate {
    let platform = platform.into();
    Box::new(move |event: &NormalizedEvent| event.platform == platform)
}

/// A route admitting only events whose content contains `keyword`.
pub fn keyword_route(keyword: impl Into<String>) -> RoutePredicate {
    let keyword = keyword.into();
    Box::new(move |event: &NormalizedEvent| event.content.contains(&keyword))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gw_adapter::MockAdapter;
    use gw_domain::config::Config;
    use gw_domain::types::AdapterCapabilities;
    use std::sync::Arc;

    fn event(message_id: &str) -> NormalizedEvent {
        NormalizedEvent {
            platform: "discord".into(),
            channel_id: "c1".into(),
            user_id: "u1".into(),
            username: "alice".into(),
            message_id: message_id.into(),
            is_dm: true,
            guild_id: String::new(),
            content: "hello".into(),
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn second_concurrent_event_for_same_key_is_rejected() {
        let router = EventRouter::new();
        let key = EventRouter::dedupe_key(&event("m1"));
        assert!(router.try_admit(&key));
        assert!(!router.try_admit(&key));
        router.release(&key);
        assert!(router.try_admit(&key));
    }

    #[test]
    fn distinct_message_ids_are_independent() {
        let router = EventRouter::new();
        assert!(router.try_admit(&EventRouter::dedupe_key(&event("m1"))));
        assert!(router.try_admit(&EventRouter::dedupe_key(&event("m2"))));
    }

    #[test]
    fn dm_only_route_rejects_guild_events() {
        let router = EventRouter::new().with_route("dm-only", true, dm_only_route());
        let mut guild_event = event("m1");
        guild_event.is_dm = false;
        assert!(!router.route_admits(&guild_event));
        assert!(router.route_admits(&event("m2")));
    }

    #[tokio::test]
    async fn duplicate_dispatch_is_rejected_without_orchestrating() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.workspace.repo_root = dir.path().to_path_buf();
        let prompt_path = dir.path().join("system_prompt.md");
        std::fs::write(&prompt_path, "system prompt").unwrap();
        config.context.system_prompt_path = prompt_path;
        let state = AppState::new(Arc::new(config));

        let router = EventRouter::new();
        let adapter: Arc<dyn PlatformAdapter> =
            Arc::new(MockAdapter::new("bot", AdapterCapabilities::default()));
        let agent_config = AgentConfig {
            command: "/no/such/binary-gw-router-test".into(),
            args: vec![],
            credential_env: "GITHUB_TOKEN".into(),
            credential: Some("tok".into()),
        };

        let key = EventRouter::dedupe_key(&event("m1"));
        assert!(router.try_admit(&key));

        let outcome = router
            .dispatch(&state, event("m1"), adapter, "copilot", &agent_config)
            .await;
        assert_eq!(outcome, DispatchOutcome::DuplicateRejected);
    }
}
