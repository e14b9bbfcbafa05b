//! Agent Connector: owns the subprocess and the bidirectional JSON-RPC
//! duplex with the external reasoning agent, speaking the Agent Client
//! Protocol described in spec §4.8.

pub mod acp;
pub mod client;
pub mod connector;
pub mod protocol;

pub use acp::{AgentCapabilities, PromptOutcome, ToolServerRef, ToolServerTransport};
pub use client::{ClientCallbacks, WorkspaceClient};
pub use connector::AgentConnector;
