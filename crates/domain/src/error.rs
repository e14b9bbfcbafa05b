/// Shared error type used across all gateway crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("workspace boundary: {0}")]
    Workspace(String),

    #[error("memory: {0}")]
    Memory(String),

    #[error("skill: {0}")]
    Skill(String),

    #[error("agent: {0}")]
    Agent(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
