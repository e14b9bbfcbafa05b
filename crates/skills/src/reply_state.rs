//! Per-(workspace, channel) single-reply guard, independent of the session
//! registry's own `reply_sent` flag. Whichever of the two detects a second
//! attempt first rejects it, per spec.

use parking_lot::Mutex;
use std::collections::HashSet;

#[derive(Default)]
pub struct ReplyStateTracker {
    sent: Mutex<HashSet<(String, String)>>,
}

impl ReplyStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically marks `(workspace_key, channel_id)` as having sent its
    /// reply. Returns `true` if this call was the one that set it.
    pub fn mark_sent(&self, workspace_key: &str, channel_id: &str) -> bool {
        let mut sent = self.sent.lock();
        sent.insert((workspace_key.to_string(), channel_id.to_string()))
    }

    pub fn has_sent(&self, workspace_key: &str, channel_id: &str) -> bool {
        self.sent
            .lock()
            .contains(&(workspace_key.to_string(), channel_id.to_string()))
    }

    /// Clears the flag, called by the orchestrator before a fresh prompt
    /// for the same workspace+channel.
    pub fn clear(&self, workspace_key: &str, channel_id: &str) {
        self.sent
            .lock()
            .remove(&(workspace_key.to_string(), channel_id.to_string()));
    }
}
