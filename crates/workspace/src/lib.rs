//! Workspace Manager: computes the isolated per-conversation directory a
//! session is bound to, and the only place in the gateway allowed to answer
//! "is this path inside that workspace".

use gw_domain::trace::TraceEvent;
use gw_domain::types::{NormalizedEvent, Workspace, WorkspaceComponents};
use gw_domain::{config::WorkspaceConfig, Error, Result};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Resolves workspace keys to directories and creates them idempotently.
///
/// `known` only caches which keys we have already created the directory
/// chain for, so a repeat `get_or_create` for a hot workspace skips the
/// filesystem round-trip; it is not a cache of the `Workspace` value itself
/// since `is_dm`/`components` are cheap to recompute from the event.
pub struct WorkspaceManager {
    repo_root: PathBuf,
    workspaces_dir: String,
    known: RwLock<HashSet<String>>,
}

impl WorkspaceManager {
    pub fn new(config: &WorkspaceConfig) -> Self {
        Self {
            repo_root: config.repo_root.clone(),
            workspaces_dir: config.workspaces_dir.clone(),
            known: RwLock::new(HashSet::new()),
        }
    }

    /// `{repo_root}/{workspaces_dir}/{platform}/{user_id}/{channel_id}`
    pub fn get_path(&self, components: &WorkspaceComponents) -> PathBuf {
        self.repo_root
            .join(&self.workspaces_dir)
            .join(&components.platform)
            .join(&components.user_id)
            .join(&components.channel_id)
    }

    /// Idempotent: creates the full ancestor chain on first call for a key,
    /// is a no-op on subsequent calls for the same key.
    pub fn get_or_create(&self, event: &NormalizedEvent) -> Result<Workspace> {
        let components = WorkspaceComponents {
            platform: event.platform.clone(),
            user_id: event.user_id.clone(),
            channel_id: event.channel_id.clone(),
        };
        let key = components.key();
        let path = self.get_path(&components);

        let created = if self.known.read().contains(&key) {
            false
        } else {
            let mut known = self.known.write();
            if known.contains(&key) {
                false
            } else {
                std::fs::create_dir_all(&path)?;
                known.insert(key.clone());
                true
            }
        };

        if created {
            TraceEvent::WorkspaceResolved {
                workspace_key: key.clone(),
                path: path.display().to_string(),
                created: true,
            }
            .emit();
        }

        Ok(Workspace {
            key,
            path,
            is_dm: event.is_dm,
            components,
        })
    }

    /// Resolves `path` against `workspace.path`, following symlinks, and
    /// returns the resolved path only if it is still inside the workspace.
    /// Never returns false quietly — an escape is always a hard error.
    pub fn validate_inside(&self, workspace: &Workspace, path: &Path) -> Result<PathBuf> {
        let root = workspace
            .path
            .canonicalize()
            .map_err(|e| Error::Workspace(format!("workspace root does not exist: {e}")))?;

        let candidate = if path.is_absolute() {
            path.to_path_buf()
        } else {
            workspace.path.join(path)
        };

        let resolved = candidate.canonicalize().map_err(|e| {
            Error::Workspace(format!("cannot resolve path {}: {e}", candidate.display()))
        })?;

        if resolved.starts_with(&root) {
            Ok(resolved)
        } else {
            Err(Error::Workspace(format!(
                "path {} escapes workspace {}",
                resolved.display(),
                workspace.key
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn event(platform: &str, user_id: &str, channel_id: &str, is_dm: bool) -> NormalizedEvent {
        NormalizedEvent {
            platform: platform.into(),
            channel_id: channel_id.into(),
            user_id: user_id.into(),
            username: "alice".into(),
            message_id: "m1".into(),
            is_dm,
            guild_id: String::new(),
            content: "hi".into(),
            timestamp: Utc::now(),
        }
    }

    fn manager_in(dir: &tempfile::TempDir) -> WorkspaceManager {
        WorkspaceManager::new(&WorkspaceConfig {
            repo_root: dir.path().to_path_buf(),
            workspaces_dir: "workspaces".into(),
        })
    }

    #[test]
    fn creates_idempotently() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager_in(&dir);
        let e = event("discord", "123", "456", true);

        let ws1 = mgr.get_or_create(&e).unwrap();
        assert!(ws1.path.is_dir());
        assert_eq!(ws1.key, "discord/123/456");

        let ws2 = mgr.get_or_create(&e).unwrap();
        assert_eq!(ws1.path, ws2.path);
    }

    #[test]
    fn distinct_keys_never_share_a_path() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager_in(&dir);
        let a = mgr.get_or_create(&event("discord", "1", "2", true)).unwrap();
        let b = mgr.get_or_create(&event("discord", "1", "3", true)).unwrap();
        assert_ne!(a.path, b.path);
    }

    #[test]
    fn validate_inside_accepts_nested_path() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager_in(&dir);
        let ws = mgr.get_or_create(&event("discord", "1", "2", true)).unwrap();
        std::fs::write(ws.path.join("note.txt"), b"hi").unwrap();

        let resolved = mgr.validate_inside(&ws, Path::new("note.txt")).unwrap();
        assert!(resolved.starts_with(ws.path.canonicalize().unwrap()));
    }

    #[test]
    fn validate_inside_rejects_escape() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager_in(&dir);
        let ws = mgr.get_or_create(&event("discord", "1", "2", true)).unwrap();

        let outside = dir.path().join("outside.txt");
        std::fs::write(&outside, b"nope").unwrap();

        let err = mgr.validate_inside(&ws, Path::new("../../../outside.txt"));
        assert!(err.is_err());
    }
}
