//! Renders an [`AssembledContext`] into the `{system_message, user_message,
//! estimated_tokens}` triple sent verbatim into the agent's `prompt`. Section
//! order and headings are bit-exact and must not be reflowed.

use gw_domain::types::{AssembledContext, FormattedContext, PlatformMessage};

use crate::token::estimate_tokens;

/// Composes the system and user messages from an assembled context.
pub fn format(context: &AssembledContext) -> FormattedContext {
    let system_message = context.system_prompt.clone();

    let mut sections = Vec::new();

    if !context.important_memories.is_empty() {
        sections.push(format_important_memories(context));
    }

    sections.push(format_recent_conversation(&context.recent_messages));

    if let Some(related) = &context.related_messages {
        if !related.is_empty() {
            sections.push(format_related_messages(related));
        }
    }

    sections.push(format_current_message(&context.trigger_message));

    let user_message = sections.join("\n\n");

    let system_tokens = estimate_tokens(&system_message);
    let user_tokens = estimate_tokens(&user_message);

    FormattedContext {
        system_message,
        user_message,
        estimated_tokens: system_tokens + user_tokens,
    }
}

fn format_important_memories(context: &AssembledContext) -> String {
    let mut out = String::from("## Important Memories\n");
    for (i, memory) in context.important_memories.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, memory.content));
    }
    out.trim_end().to_string()
}

fn format_recent_conversation(messages: &[PlatformMessage]) -> String {
    let mut out = String::from("## Recent Conversation\n");
    for message in messages {
        out.push_str(&format_message_line(message));
        out.push('\n');
    }
    out.trim_end().to_string()
}

fn format_related_messages(messages: &[PlatformMessage]) -> String {
    let mut out = String::from("## Related Messages from this Server\n");
    for message in messages {
        out.push_str(&format_message_line(message));
        out.push('\n');
    }
    out.trim_end().to_string()
}

fn format_current_message(trigger: &PlatformMessage) -> String {
    format!(
        "## Current Message\n{}: {}\nPlease respond to the current message above.",
        trigger.username, trigger.content
    )
}

fn format_message_line(message: &PlatformMessage) -> String {
    let speaker = if message.is_bot { "[Bot]" } else { "[User]" };
    format!("{speaker} {}: {}", message.username, message.content)
}

/// Truncates `user_message` from the end, appending `...`, by binary
/// search on character length, so that `system_tokens + estimate(user) ≤
/// token_limit`. Returns the message unchanged when already within budget.
pub fn truncate_to_token_limit(
    system_message: &str,
    user_message: &str,
    token_limit: usize,
) -> String {
    let system_tokens = estimate_tokens(system_message);
    if system_tokens >= token_limit {
        return String::new();
    }
    let budget = token_limit - system_tokens;
    if estimate_tokens(user_message) <= budget {
        return user_message.to_string();
    }

    let chars: Vec<char> = user_message.chars().collect();
    let mut lo = 0usize;
    let mut hi = chars.len();

    while lo < hi {
        let mid = (lo + hi).div_ceil(2);
        let candidate = make_truncated(&chars, mid);
        if estimate_tokens(&candidate) <= budget {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }

    make_truncated(&chars, lo)
}

fn make_truncated(chars: &[char], len: usize) -> String {
    if len >= chars.len() {
        return chars.iter().collect();
    }
    let body: String = chars[..len].iter().collect();
    format!("{body}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gw_domain::types::{Importance, ResolvedMemory, Visibility};

    fn pm(username: &str, content: &str, is_bot: bool) -> PlatformMessage {
        PlatformMessage {
            message_id: "1".to_string(),
            user_id: "u1".to_string(),
            username: username.to_string(),
            content: content.to_string(),
            timestamp: Utc::now(),
            is_bot,
        }
    }

    fn base_context() -> AssembledContext {
        AssembledContext {
            system_prompt: "You are a helpful assistant.".to_string(),
            important_memories: vec![],
            recent_messages: vec![pm("Alice", "hi there", false)],
            related_messages: None,
            trigger_message: pm("Alice", "what's up?", false),
            estimated_tokens: 0,
            assembled_at: Utc::now(),
        }
    }

    #[test]
    fn omits_important_memories_section_when_empty() {
        let context = base_context();
        let formatted = format(&context);
        assert!(!formatted.user_message.contains("## Important Memories"));
    }

    #[test]
    fn includes_important_memories_as_numbered_list() {
        let mut context = base_context();
        context.important_memories = vec![ResolvedMemory {
            id: "m1".to_string(),
            ts: Utc::now(),
            enabled: true,
            visibility: Visibility::Public,
            importance: Importance::High,
            content: "likes hiking".to_string(),
        }];
        let formatted = format(&context);
        assert!(formatted
            .user_message
            .contains("## Important Memories\n1. likes hiking"));
    }

    #[test]
    fn prefixes_bot_and_user_lines() {
        let mut context = base_context();
        context.recent_messages = vec![pm("Bot", "hello", true), pm("Alice", "hi", false)];
        let formatted = format(&context);
        assert!(formatted.user_message.contains("[Bot] Bot: hello"));
        assert!(formatted.user_message.contains("[User] Alice: hi"));
    }

    #[test]
    fn omits_related_section_when_absent() {
        let context = base_context();
        let formatted = format(&context);
        assert!(!formatted
            .user_message
            .contains("## Related Messages from this Server"));
    }

    #[test]
    fn current_message_ends_with_instruction_line() {
        let context = base_context();
        let formatted = format(&context);
        assert!(formatted
            .user_message
            .ends_with("Please respond to the current message above."));
        assert!(formatted
            .user_message
            .contains("## Current Message\nAlice: what's up?"));
    }

    #[test]
    fn truncation_respects_token_budget() {
        let system = "short system prompt";
        let long_user = "a".repeat(2000);
        let truncated = truncate_to_token_limit(system, &long_user, 50);
        assert!(truncated.ends_with("..."));
        let system_tokens = estimate_tokens(system);
        assert!(system_tokens + estimate_tokens(&truncated) <= 50);
    }

    #[test]
    fn truncation_is_noop_within_budget() {
        let system = "short";
        let user = "hello world";
        let result = truncate_to_token_limit(system, user, 10_000);
        assert_eq!(result, user);
    }
}
