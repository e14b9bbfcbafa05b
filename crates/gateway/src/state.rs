//! Shared application state: the one `AppState` every HTTP handler, the
//! orchestrator, and the event router all hold a clone of.

use std::collections::HashMap;
use std::sync::Arc;

use gw_adapter::PlatformAdapter;
use gw_contextpack::ContextAssembler;
use gw_domain::config::Config;
use gw_memory::MemoryLog;
use gw_sessions::SessionRegistry;
use gw_skills::{ReplyStateTracker, SkillHandlers};
use gw_workspace::WorkspaceManager;
use parking_lot::RwLock;

/// Registry of connected platform adapters, keyed by platform name
/// (`"discord"`, `"misskey"`, ...). Concrete adapters are out of this
/// system's scope; whatever process owns a live connection registers it
/// here before events from that platform can be routed.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: Arc<RwLock<HashMap<String, Arc<dyn PlatformAdapter>>>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, platform: impl Into<String>, adapter: Arc<dyn PlatformAdapter>) {
        self.adapters.write().insert(platform.into(), adapter);
    }

    pub fn get(&self, platform: &str) -> Option<Arc<dyn PlatformAdapter>> {
        self.adapters.read().get(platform).cloned()
    }
}

/// Everything a handler needs: config plus one shared instance of every
/// orchestration-layer service. Cheap to clone — every field is an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub workspace: Arc<WorkspaceManager>,
    pub memory: Arc<MemoryLog>,
    pub sessions: Arc<SessionRegistry>,
    pub reply_state: Arc<ReplyStateTracker>,
    pub skills: Arc<SkillHandlers>,
    pub context: Arc<ContextAssembler>,
    pub adapters: AdapterRegistry,
}

impl AppState {
    pub fn new(config: Arc<Config>) -> Self {
        let workspace = Arc::new(WorkspaceManager::new(&config.workspace));
        let memory = Arc::new(MemoryLog::new());
        let sessions = Arc::new(SessionRegistry::new());
        let reply_state = Arc::new(ReplyStateTracker::new());
        let skills = Arc::new(SkillHandlers::new(
            memory.clone(),
            reply_state.clone(),
            config.context.memory_max_chars,
        ));
        let context = Arc::new(ContextAssembler::new(memory.clone(), config.context.clone()));

        Self {
            config,
            workspace,
            memory,
            sessions,
            reply_state,
            skills,
            context,
            adapters: AdapterRegistry::new(),
        }
    }
}
