//! In-memory [`PlatformAdapter`] test double. Records every reply sent
//! through it and serves canned history, so the orchestrator's own test
//! suite and the CLI's `doctor`/run diagnostics can exercise the full
//! pipeline without a live Discord or Misskey connection.

use std::collections::HashMap;

use async_trait::async_trait;
use gw_domain::types::{AdapterCapabilities, NormalizedEvent, PlatformMessage};
use gw_domain::Result;
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;

use crate::contract::{ConnectionStatus, PlatformAdapter, ReplyOptions};

#[derive(Debug, Clone)]
pub struct SentReply {
    pub channel_id: String,
    pub content: String,
    pub reply_to: Option<String>,
}

pub struct MockAdapter {
    self_id: String,
    capabilities: AdapterCapabilities,
    history: Mutex<HashMap<String, Vec<PlatformMessage>>>,
    sent: Mutex<Vec<SentReply>>,
    status: Mutex<ConnectionStatus>,
}

impl MockAdapter {
    pub fn new(self_id: impl Into<String>, capabilities: AdapterCapabilities) -> Self {
        Self {
            self_id: self_id.into(),
            capabilities,
            history: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            status: Mutex::new(ConnectionStatus::Disconnected),
        }
    }

    pub fn seed_history(&self, channel_id: impl Into<String>, messages: Vec<PlatformMessage>) {
        self.history.lock().insert(channel_id.into(), messages);
    }

    pub fn sent_replies(&self) -> Vec<SentReply> {
        self.sent.lock().clone()
    }

    pub fn last_reply(&self) -> Option<SentReply> {
        self.sent.lock().last().cloned()
    }
}

#[async_trait]
impl PlatformAdapter for MockAdapter {
    async fn connect(&self, _events: UnboundedSender<NormalizedEvent>) -> Result<()> {
        *self.status.lock() = ConnectionStatus::Connected;
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        *self.status.lock() = ConnectionStatus::Disconnected;
        Ok(())
    }

    async fn send_reply(
        &self,
        channel_id: &str,
        content: &str,
        options: ReplyOptions,
    ) -> Result<()> {
        self.sent.lock().push(SentReply {
            channel_id: channel_id.to_string(),
            content: content.to_string(),
            reply_to: options.reply_to,
        });
        Ok(())
    }

    async fn fetch_recent(&self, channel_id: &str, limit: usize) -> Result<Vec<PlatformMessage>> {
        let history = self.history.lock();
        let Some(messages) = history.get(channel_id) else {
            return Ok(Vec::new());
        };
        let start = messages.len().saturating_sub(limit);
        Ok(messages[start..].to_vec())
    }

    async fn get_username(&self, user_id: &str) -> Result<String> {
        Ok(format!("user-{user_id}"))
    }

    fn is_self(&self, user_id: &str) -> bool {
        user_id == self.self_id
    }

    fn capabilities(&self) -> AdapterCapabilities {
        self.capabilities
    }

    fn connection_status(&self) -> ConnectionStatus {
        *self.status.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: &str, content: &str) -> PlatformMessage {
        PlatformMessage {
            message_id: id.to_string(),
            user_id: "u1".to_string(),
            username: "Alice".to_string(),
            content: content.to_string(),
            timestamp: chrono::Utc::now(),
            is_bot: false,
        }
    }

    #[tokio::test]
    async fn records_sent_replies() {
        let adapter = MockAdapter::new("bot-1", AdapterCapabilities::default());
        adapter
            .send_reply("chan-1", "hello", ReplyOptions::default())
            .await
            .unwrap();
        let sent = adapter.sent_replies();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].content, "hello");
    }

    #[tokio::test]
    async fn fetch_recent_respects_limit_and_channel() {
        let adapter = MockAdapter::new("bot-1", AdapterCapabilities::default());
        adapter.seed_history(
            "chan-1",
            vec![msg("1", "a"), msg("2", "b"), msg("3", "c"), msg("4", "d")],
        );
        let recent = adapter.fetch_recent("chan-1", 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message_id, "3");
        assert_eq!(recent[1].message_id, "4");

        let none = adapter.fetch_recent("chan-2", 2).await.unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn is_self_matches_configured_id() {
        let adapter = MockAdapter::new("bot-1", AdapterCapabilities::default());
        assert!(adapter.is_self("bot-1"));
        assert!(!adapter.is_self("someone-else"));
    }
}
