//! Session Registry: issues session ids, tracks the single-reply flag, and
//! expires ephemeral sessions bound to one agent invocation each.

pub mod registry;

pub use registry::{NewSession, Session, SessionRegistry};
