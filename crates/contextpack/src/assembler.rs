//! Context Assembler: merges the system prompt, important memories, recent
//! and related platform history, and the triggering event into an
//! [`AssembledContext`] ready for `format()`.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use chrono::Utc;
use gw_adapter::PlatformAdapter;
use gw_domain::config::ContextConfig;
use gw_domain::types::{AssembledContext, NormalizedEvent, PlatformMessage, Workspace};
use gw_domain::Result;
use gw_memory::MemoryLog;
use parking_lot::Mutex;

use crate::token::estimate_tokens;

struct CachedPrompt {
    modified: Option<SystemTime>,
    text: String,
}

/// Caches the on-disk system prompt, reloading only when its mtime changes.
struct SystemPromptCache {
    path: PathBuf,
    cached: Mutex<Option<CachedPrompt>>,
}

impl SystemPromptCache {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            cached: Mutex::new(None),
        }
    }

    fn load(&self) -> Result<String> {
        let modified = fs::metadata(&self.path).and_then(|m| m.modified()).ok();

        let mut cached = self.cached.lock();
        if let Some(existing) = cached.as_ref() {
            if existing.modified == modified && modified.is_some() {
                return Ok(existing.text.clone());
            }
        }

        let text = fs::read_to_string(&self.path).unwrap_or_default();
        *cached = Some(CachedPrompt {
            modified,
            text: text.clone(),
        });
        Ok(text)
    }
}

/// Builds [`AssembledContext`] values for normalized events, per workspace
/// session. One instance is shared across all sessions for a given agent
/// process; the system prompt cache is the only stateful part.
pub struct ContextAssembler {
    memory: Arc<MemoryLog>,
    config: ContextConfig,
    system_prompt: SystemPromptCache,
}

impl ContextAssembler {
    pub fn new(memory: Arc<MemoryLog>, config: ContextConfig) -> Self {
        let system_prompt = SystemPromptCache::new(config.system_prompt_path.clone());
        Self {
            memory,
            config,
            system_prompt,
        }
    }

    pub async fn assemble(
        &self,
        event: &NormalizedEvent,
        workspace: &Workspace,
        adapter: &dyn PlatformAdapter,
    ) -> Result<AssembledContext> {
        let system_prompt = self.system_prompt.load()?;

        let important_memories = self.memory.important(workspace)?;

        let recent_messages = adapter
            .fetch_recent(&event.channel_id, self.config.recent_message_limit)
            .await?;

        let related_messages = if !event.guild_id.is_empty() && adapter.capabilities().search {
            adapter
                .search_related(&event.guild_id, &event.channel_id, &event.content, 10)
                .await?
        } else {
            None
        };

        let trigger_message = PlatformMessage {
            message_id: event.message_id.clone(),
            user_id: event.user_id.clone(),
            username: event.username.clone(),
            content: event.content.clone(),
            timestamp: event.timestamp,
            is_bot: false,
        };

        let mut context = AssembledContext {
            system_prompt,
            important_memories,
            recent_messages,
            related_messages,
            trigger_message,
            estimated_tokens: 0,
            assembled_at: Utc::now(),
        };

        let formatted = crate::format::format(&context);
        context.estimated_tokens = formatted.estimated_tokens;

        Ok(context)
    }

    /// Renders `context` and truncates the user message to fit
    /// `token_limit`, returning the final prompt triple.
    pub fn format_for_prompt(&self, context: &AssembledContext) -> gw_domain::types::FormattedContext {
        let formatted = crate::format::format(context);
        if formatted.estimated_tokens <= self.config.token_limit {
            return formatted;
        }

        let user_message = crate::format::truncate_to_token_limit(
            &formatted.system_message,
            &formatted.user_message,
            self.config.token_limit,
        );
        let estimated_tokens =
            estimate_tokens(&formatted.system_message) + estimate_tokens(&user_message);

        gw_domain::types::FormattedContext {
            system_message: formatted.system_message,
            user_message,
            estimated_tokens,
        }
    }
}
