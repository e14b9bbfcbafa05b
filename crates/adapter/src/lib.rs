//! Platform Adapter contract: the trait boundary every Discord/Misskey/etc.
//! client implements, a jittered reconnect policy, and an in-memory mock
//! used by tests and the CLI's diagnostic run.

pub mod backoff;
pub mod contract;
pub mod mock;

pub use backoff::ReconnectBackoff;
pub use contract::{should_emit, strip_mention, truncate_for_platform, ConnectionStatus, PlatformAdapter, ReplyOptions};
pub use mock::{MockAdapter, SentReply};
