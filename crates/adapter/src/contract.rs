//! Platform Adapter contract: what the orchestrator and context assembler
//! require from any concrete Discord/Misskey/etc. wire client. Only the
//! trait and a mock test double live here — concrete network clients are
//! out of scope for this system.

use async_trait::async_trait;
use gw_domain::types::{AdapterCapabilities, NormalizedEvent, PlatformMessage};
use gw_domain::Result;
use tokio::sync::mpsc::UnboundedSender;

/// Current state of an adapter's connection to its platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// Optional per-reply threading/scoping hint.
#[derive(Debug, Clone, Default)]
pub struct ReplyOptions {
    /// Thread this reply to a specific message, when the platform supports it.
    pub reply_to: Option<String>,
}

/// The contract every concrete platform client (Discord, Misskey, ...)
/// must satisfy. Normalized events are pushed onto `events` rather than
/// returned from `connect`, since a live adapter keeps producing them for
/// as long as it stays connected.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Establish the platform connection and begin emitting normalized
    /// events onto `events`. Implementations own their own reconnect loop
    /// (see [`crate::backoff::ReconnectBackoff`]).
    async fn connect(&self, events: UnboundedSender<NormalizedEvent>) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    /// Send the terminal reply for a session. `content` has already been
    /// truncated to the adapter's `max_message_length` by the caller only
    /// if the caller chose to; adapters must still enforce the cap
    /// themselves as a last line of defense.
    async fn send_reply(
        &self,
        channel_id: &str,
        content: &str,
        options: ReplyOptions,
    ) -> Result<()>;

    async fn fetch_recent(&self, channel_id: &str, limit: usize) -> Result<Vec<PlatformMessage>>;

    /// `None` when the adapter doesn't advertise `capabilities().search`.
    async fn search_related(
        &self,
        _guild_id: &str,
        _channel_id: &str,
        _query: &str,
        _limit: usize,
    ) -> Result<Option<Vec<PlatformMessage>>> {
        Ok(None)
    }

    async fn get_username(&self, user_id: &str) -> Result<String>;

    fn is_self(&self, user_id: &str) -> bool;

    fn capabilities(&self) -> AdapterCapabilities;

    fn connection_status(&self) -> ConnectionStatus;
}

/// Truncates `content` to `max_message_length - 3` and appends `...` when
/// it overflows, per spec.md §4.3.
pub fn truncate_for_platform(content: &str, max_message_length: usize) -> String {
    if max_message_length < 4 || content.chars().count() <= max_message_length {
        return content.chars().take(max_message_length).collect();
    }
    let budget = max_message_length - 3;
    let truncated: String = content.chars().take(budget).collect();
    format!("{truncated}...")
}

/// Strips a leading or trailing bot-mention token from `content` for
/// mention-triggered events, per spec.md §4.3. `mention_token` is the
/// platform-specific literal (e.g. `<@123456>` on Discord).
pub fn strip_mention(content: &str, mention_token: &str) -> String {
    let mut stripped = content.replacen(mention_token, "", 1);
    stripped = stripped.trim().to_string();
    stripped
}

/// Whether an adapter should emit a normalized event for an inbound
/// message, per spec.md §4.3: DM (if allowed), direct mention, or a
/// configured command prefix — never for self or other bot authors.
pub fn should_emit(
    is_self_or_bot: bool,
    is_dm: bool,
    dm_allowed: bool,
    is_mentioned: bool,
    content: &str,
    command_prefix: Option<&str>,
) -> bool {
    if is_self_or_bot {
        return false;
    }
    if is_dm && dm_allowed {
        return true;
    }
    if is_mentioned {
        return true;
    }
    if let Some(prefix) = command_prefix {
        if !prefix.is_empty() && content.starts_with(prefix) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_and_appends_ellipsis() {
        let long = "a".repeat(50);
        let out = truncate_for_platform(&long, 10);
        assert_eq!(out.chars().count(), 10);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn leaves_short_content_untouched() {
        assert_eq!(truncate_for_platform("hi", 10), "hi");
    }

    #[test]
    fn strips_mention_token() {
        let out = strip_mention("<@123> hello there", "<@123>");
        assert_eq!(out, "hello there");
    }

    #[test]
    fn emits_for_dm_when_allowed() {
        assert!(should_emit(false, true, true, false, "hi", None));
    }

    #[test]
    fn does_not_emit_for_dm_when_disallowed() {
        assert!(!should_emit(false, true, false, false, "hi", None));
    }

    #[test]
    fn never_emits_for_self_or_bot() {
        assert!(!should_emit(true, true, true, true, "hi", Some("!")));
    }

    #[test]
    fn emits_for_mention_in_guild() {
        assert!(should_emit(false, false, false, true, "hi", None));
    }

    #[test]
    fn emits_for_command_prefix() {
        assert!(should_emit(false, false, false, false, "!ping", Some("!")));
    }

    #[test]
    fn plain_guild_message_is_suppressed() {
        assert!(!should_emit(false, false, false, false, "hi", Some("!")));
    }
}
