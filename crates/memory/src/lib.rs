//! Memory Log: append-only JSONL memory and patch events, one pair of files
//! per workspace.

use chrono::Utc;
use gw_domain::trace::TraceEvent;
use gw_domain::types::{
    Importance, MemoryEvent, MemoryEventKind, PatchChanges, PatchEvent, PatchEventKind,
    ResolvedMemory, Visibility, Workspace,
};
use gw_domain::{Error, Result};
use parking_lot::Mutex as SyncMutex;
use rand::RngCore;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

const PUBLIC_FILE: &str = "memory.public.jsonl";
const PRIVATE_FILE: &str = "memory.private.jsonl";

/// Options accepted by `memory-save`.
#[derive(Debug, Clone)]
pub struct SaveOptions {
    pub visibility: Visibility,
    pub importance: Importance,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            visibility: Visibility::Public,
            importance: Importance::Normal,
        }
    }
}

/// Append-only memory store, one instance shared across all workspaces.
///
/// Each workspace's append path is serialized through its own
/// `tokio::sync::Mutex`, the same single-writer-per-key shape used
/// elsewhere in this codebase for anything that must not interleave two
/// concurrent writers on one file.
pub struct MemoryLog {
    writers: SyncMutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>,
    skipped: SyncMutex<HashMap<PathBuf, u64>>,
}

impl Default for MemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLog {
    pub fn new() -> Self {
        Self {
            writers: SyncMutex::new(HashMap::new()),
            skipped: SyncMutex::new(HashMap::new()),
        }
    }

    fn writer_for(&self, path: &Path) -> Arc<AsyncMutex<()>> {
        let mut writers = self.writers.lock();
        writers
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    fn note_skip(&self, path: &Path) {
        *self.skipped.lock().entry(path.to_path_buf()).or_insert(0) += 1;
    }

    /// Number of malformed lines skipped for a workspace's public file since
    /// process start; surfaced by the `doctor` CLI command.
    pub fn skipped_count(&self, workspace: &Workspace) -> u64 {
        *self
            .skipped
            .lock()
            .get(&public_path(workspace))
            .unwrap_or(&0)
    }

    pub async fn add(
        &self,
        workspace: &Workspace,
        content: String,
        options: SaveOptions,
    ) -> Result<MemoryEvent> {
        if options.visibility == Visibility::Private && !workspace.is_dm {
            return Err(Error::Memory(
                "Private memories can only be saved in DM contexts".into(),
            ));
        }

        let path = match options.visibility {
            Visibility::Public => public_path(workspace),
            Visibility::Private => private_path(workspace),
        };

        let event = MemoryEvent {
            kind: MemoryEventKind::Memory,
            id: generate_id(),
            ts: Utc::now(),
            enabled: true,
            visibility: options.visibility,
            importance: options.importance,
            content,
        };

        self.append_line(&path, &event).await?;

        TraceEvent::MemoryAppended {
            workspace_key: workspace.key.clone(),
            kind: "memory",
            id: event.id.clone(),
        }
        .emit();

        Ok(event)
    }

    pub async fn patch(
        &self,
        workspace: &Workspace,
        target_id: String,
        changes: PatchChanges,
    ) -> Result<PatchEvent> {
        let event = PatchEvent {
            kind: PatchEventKind::Patch,
            target_id,
            ts: Utc::now(),
            changes,
        };

        // A patch's target may live in either file; we don't know which
        // without reading, so append to whichever file currently resolves
        // the id, defaulting to public (the common case) when neither does.
        let public = public_path(workspace);
        let private = private_path(workspace);
        let target_path = if workspace.is_dm
            && private.exists()
            && self.fold(&private)?.contains_key(&event.target_id)
        {
            private
        } else {
            public
        };

        self.append_line(&target_path, &event).await?;

        TraceEvent::MemoryAppended {
            workspace_key: workspace.key.clone(),
            kind: "patch",
            id: event.target_id.clone(),
        }
        .emit();

        Ok(event)
    }

    /// Enabled, high-importance memories, ascending by `ts`. DMs additionally
    /// include the private file's resolved memories.
    pub fn important(&self, workspace: &Workspace) -> Result<Vec<ResolvedMemory>> {
        let mut all = self.resolved_all(workspace)?;
        all.retain(|m| m.enabled && m.importance == Importance::High);
        all.sort_by_key(|m| m.ts);
        Ok(all)
    }

    /// Case-insensitive, whitespace-split, AND-of-terms substring search
    /// over `content`, newest first, capped at `limit`.
    pub fn search(
        &self,
        workspace: &Workspace,
        query: &str,
        limit: usize,
        max_chars: usize,
    ) -> Result<Vec<ResolvedMemory>> {
        let terms: Vec<String> = query
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();

        let mut all = self.resolved_all(workspace)?;
        all.sort_by(|a, b| b.ts.cmp(&a.ts));

        let mut results = Vec::new();
        for mut m in all {
            let haystack = m.content.to_lowercase();
            if terms.iter().all(|t| haystack.contains(t.as_str())) {
                if m.content.chars().count() > max_chars {
                    m.content = m.content.chars().take(max_chars).collect();
                }
                results.push(m);
                if results.len() >= limit {
                    break;
                }
            }
        }
        Ok(results)
    }

    fn resolved_all(&self, workspace: &Workspace) -> Result<Vec<ResolvedMemory>> {
        let mut resolved: Vec<ResolvedMemory> = self.fold(&public_path(workspace))?.into_values().collect();
        if workspace.is_dm {
            let private_path = private_path(workspace);
            if private_path.exists() {
                resolved.extend(self.fold(&private_path)?.into_values());
            }
        }
        Ok(resolved)
    }

    /// Reads a file and folds every memory/patch event into the resolved
    /// view, in first-appearance order, one pass. Malformed lines are
    /// skipped and counted, never fatal.
    fn fold(&self, path: &Path) -> Result<HashMap<String, ResolvedMemory>> {
        let mut resolved: HashMap<String, ResolvedMemory> = HashMap::new();
        let mut pending_patches: HashMap<String, Vec<PatchEvent>> = HashMap::new();

        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(resolved),
            Err(e) => return Err(Error::Memory(format!("reading {}: {e}", path.display()))),
        };

        for line in raw.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let value: serde_json::Value = match serde_json::from_str(trimmed) {
                Ok(v) => v,
                Err(_) => {
                    self.note_skip(path);
                    continue;
                }
            };
            match value.get("type").and_then(|t| t.as_str()) {
                Some("memory") => match serde_json::from_value::<MemoryEvent>(value) {
                    Ok(event) => {
                        if let Some(patches) = pending_patches.remove(&event.id) {
                            resolved.insert(event.id.clone(), apply_patches(event, patches));
                        } else {
                            resolved.insert(
                                event.id.clone(),
                                ResolvedMemory {
                                    id: event.id,
                                    ts: event.ts,
                                    enabled: event.enabled,
                                    visibility: event.visibility,
                                    importance: event.importance,
                                    content: event.content,
                                },
                            );
                        }
                    }
                    Err(_) => self.note_skip(path),
                },
                Some("patch") => match serde_json::from_value::<PatchEvent>(value) {
                    Ok(patch) => {
                        if let Some(existing) = resolved.remove(&patch.target_id) {
                            resolved.insert(
                                patch.target_id.clone(),
                                apply_patch_to_resolved(existing, &patch),
                            );
                        } else {
                            pending_patches
                                .entry(patch.target_id.clone())
                                .or_default()
                                .push(patch);
                        }
                    }
                    Err(_) => self.note_skip(path),
                },
                _ => self.note_skip(path),
            }
        }

        Ok(resolved)
    }

    async fn append_line<T: serde::Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        use tokio::io::AsyncWriteExt;

        let lock = self.writer_for(path);
        let _guard = lock.lock().await;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut line = serde_json::to_string(value)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

fn apply_patches(event: MemoryEvent, mut patches: Vec<PatchEvent>) -> ResolvedMemory {
    patches.sort_by_key(|p| p.ts);
    let mut resolved = ResolvedMemory {
        id: event.id,
        ts: event.ts,
        enabled: event.enabled,
        visibility: event.visibility,
        importance: event.importance,
        content: event.content,
    };
    for patch in &patches {
        resolved = apply_patch_to_resolved(resolved, patch);
    }
    resolved
}

fn apply_patch_to_resolved(mut resolved: ResolvedMemory, patch: &PatchEvent) -> ResolvedMemory {
    if let Some(enabled) = patch.changes.enabled {
        resolved.enabled = enabled;
    }
    if let Some(visibility) = patch.changes.visibility {
        resolved.visibility = visibility;
    }
    if let Some(importance) = patch.changes.importance {
        resolved.importance = importance;
    }
    resolved
}

fn public_path(workspace: &Workspace) -> PathBuf {
    workspace.path.join(PUBLIC_FILE)
}

fn private_path(workspace: &Workspace) -> PathBuf {
    workspace.path.join(PRIVATE_FILE)
}

fn generate_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let mut bytes = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{millis}-{}", hex::encode(bytes))
}
