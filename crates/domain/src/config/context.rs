use serde::Deserialize;
use std::path::PathBuf;

fn d_recent_message_limit() -> usize {
    20
}

fn d_memory_max_chars() -> usize {
    500
}

fn d_token_limit() -> usize {
    8000
}

fn d_system_prompt_path() -> PathBuf {
    PathBuf::from("system_prompt.md")
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "d_recent_message_limit")]
    pub recent_message_limit: usize,
    #[serde(default = "d_memory_max_chars")]
    pub memory_max_chars: usize,
    #[serde(default = "d_token_limit")]
    pub token_limit: usize,
    #[serde(default = "d_system_prompt_path")]
    pub system_prompt_path: PathBuf,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            recent_message_limit: d_recent_message_limit(),
            memory_max_chars: d_memory_max_chars(),
            token_limit: d_token_limit(),
            system_prompt_path: d_system_prompt_path(),
        }
    }
}
