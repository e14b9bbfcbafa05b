//! Session Registry: ephemeral, in-memory bookkeeping for one agent
//! invocation bound to one workspace and one platform event.
//!
//! A session is created just before the agent subprocess is spawned and
//! destroyed at prompt completion, cancellation, or timeout. The registry
//! is the single source of truth for `reply_sent`: both the skill HTTP
//! gateway and the in-process `send-reply` handler call `mark_reply_sent`,
//! and whichever reaches it first wins the compare-and-set.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use gw_domain::types::Workspace;
use parking_lot::RwLock;

/// A session record. `reply_sent` is the only field mutated after
/// registration, and only through `SessionRegistry::mark_reply_sent`.
pub struct Session {
    pub id: String,
    pub platform: String,
    pub channel_id: String,
    pub user_id: String,
    pub workspace: Workspace,
    pub started_at: DateTime<Utc>,
    pub timeout_ms: u64,
    reply_sent: AtomicBool,
    expires_at: Instant,
}

impl Session {
    pub fn reply_sent(&self) -> bool {
        self.reply_sent.load(Ordering::SeqCst)
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Parameters for registering a new session.
pub struct NewSession {
    pub platform: String,
    pub channel_id: String,
    pub user_id: String,
    pub workspace: Workspace,
    pub timeout_ms: u64,
}

/// In-memory registry of active sessions, keyed by `sess_`-prefixed id.
///
/// All operations are safe for concurrent callers; `mark_reply_sent` is an
/// atomic compare-and-set so the HTTP gateway and the in-process handler
/// can race on the same session without double-dispatching a reply.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// `sess_{unix_millis}_{uuidv4}` — locally unique with overwhelming
    /// probability, sortable by creation time.
    pub fn generate_id(&self) -> String {
        let millis = Utc::now().timestamp_millis();
        format!("sess_{millis}_{}", uuid::Uuid::new_v4())
    }

    /// Register a new session and return its id.
    pub fn register(&self, new: NewSession) -> String {
        let id = self.generate_id();
        let now = Instant::now();
        let session = Arc::new(Session {
            id: id.clone(),
            platform: new.platform,
            channel_id: new.channel_id,
            user_id: new.user_id,
            workspace: new.workspace,
            started_at: Utc::now(),
            timeout_ms: new.timeout_ms,
            reply_sent: AtomicBool::new(false),
            expires_at: now + Duration::from_millis(new.timeout_ms),
        });

        gw_domain::trace::TraceEvent::SessionRegistered {
            session_id: id.clone(),
            workspace_key: session.workspace.key.clone(),
            timeout_ms: session.timeout_ms,
        }
        .emit();

        self.sessions.write().insert(id.clone(), session);
        id
    }

    /// Look up a session by id. An expired session is treated as absent
    /// and removed eagerly.
    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        let now = Instant::now();
        {
            let sessions = self.sessions.read();
            match sessions.get(id) {
                Some(s) if !s.is_expired(now) => return Some(s.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        // Expired: remove and report absent.
        self.remove(id);
        None
    }

    pub fn has(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn has_reply_sent(&self, id: &str) -> bool {
        self.get(id).map(|s| s.reply_sent()).unwrap_or(false)
    }

    /// Atomically flips `reply_sent` from false to true. Returns `false`
    /// if it was already set or the session is unknown/expired.
    pub fn mark_reply_sent(&self, id: &str) -> bool {
        match self.get(id) {
            Some(session) => session
                .reply_sent
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok(),
            None => false,
        }
    }

    pub fn remove(&self, id: &str) {
        if self.sessions.write().remove(id).is_some() {
            gw_domain::trace::TraceEvent::SessionExpired {
                session_id: id.to_string(),
            }
            .emit();
        }
    }

    pub fn active_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Sweep every expired session. Intended to run on a periodic timer
    /// (default every 60s); `get`/`has` already evict lazily, so this only
    /// matters for sessions nobody ever looks up again.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<String> = self
            .sessions
            .read()
            .iter()
            .filter(|(_, s)| s.is_expired(now))
            .map(|(id, _)| id.clone())
            .collect();
        let count = expired.len();
        for id in expired {
            self.remove(&id);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gw_domain::types::WorkspaceComponents;
    use std::path::PathBuf;

    fn workspace() -> Workspace {
        Workspace {
            key: "discord/1/2".into(),
            path: PathBuf::from("/tmp/ws"),
            is_dm: true,
            components: WorkspaceComponents {
                platform: "discord".into(),
                user_id: "1".into(),
                channel_id: "2".into(),
            },
        }
    }

    fn register(registry: &SessionRegistry, timeout_ms: u64) -> String {
        registry.register(NewSession {
            platform: "discord".into(),
            channel_id: "2".into(),
            user_id: "1".into(),
            workspace: workspace(),
            timeout_ms,
        })
    }

    #[test]
    fn generated_ids_are_prefixed_and_unique() {
        let registry = SessionRegistry::new();
        let a = register(&registry, 60_000);
        let b = register(&registry, 60_000);
        assert!(a.starts_with("sess_"));
        assert_ne!(a, b);
    }

    #[test]
    fn mark_reply_sent_is_single_shot() {
        let registry = SessionRegistry::new();
        let id = register(&registry, 60_000);
        assert!(registry.mark_reply_sent(&id));
        assert!(!registry.mark_reply_sent(&id));
        assert!(registry.has_reply_sent(&id));
    }

    #[test]
    fn unknown_session_is_absent() {
        let registry = SessionRegistry::new();
        assert!(!registry.has("sess_does_not_exist"));
        assert!(!registry.mark_reply_sent("sess_does_not_exist"));
    }

    #[test]
    fn expired_session_is_treated_as_absent() {
        let registry = SessionRegistry::new();
        let id = register(&registry, 1);
        std::thread::sleep(Duration::from_millis(20));
        assert!(!registry.has(&id));
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn sweep_removes_only_expired() {
        let registry = SessionRegistry::new();
        let short = register(&registry, 1);
        let long = register(&registry, 60_000);
        std::thread::sleep(Duration::from_millis(20));
        let swept = registry.sweep_expired();
        assert_eq!(swept, 1);
        assert!(!registry.has(&short));
        assert!(registry.has(&long));
    }
}
