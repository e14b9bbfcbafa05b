//! Wires together the workspace, memory, session, context, skill, and
//! agent-connector crates into a runnable gateway: the Skill HTTP Gateway
//! (§4.7), the Session Orchestrator (§4.9), and the Event Router /
//! Message Handler (§4.10).

pub mod cli;
pub mod doctor;
pub mod http;
pub mod orchestrator;
pub mod router;
pub mod state;
