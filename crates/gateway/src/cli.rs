//! Command-line entry points: `serve` (default) and `doctor`.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use gw_domain::config::Config;

const DEFAULT_CONFIG_PATH: &str = "config.toml";
const CONFIG_ENV_VAR: &str = "GW_CONFIG";

#[derive(Parser, Debug)]
#[command(name = "agent-gateway", about = "Conversational agent gateway")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP skill gateway and the event router (default).
    Serve,
    /// Run startup diagnostics and exit.
    Doctor,
}

impl Cli {
    pub fn command(&self) -> Command {
        match &self.command {
            Some(Command::Serve) | None => Command::Serve,
            Some(Command::Doctor) => Command::Doctor,
        }
    }
}

/// Resolves the config file path from `$GW_CONFIG` or the current
/// directory's `config.toml`, falling back to `Config::default()` when
/// neither exists. A missing file is a `doctor` finding, not a fatal
/// startup error.
pub fn config_path() -> PathBuf {
    std::env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    if !path.is_file() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)?;
    let config = Config::load_from_str(&raw)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_path_falls_back_to_default() {
        let config = load_config(Path::new("/no/such/gw-config.toml")).unwrap();
        assert_eq!(config.server.port, Config::default().server.port);
    }

    #[test]
    fn loads_a_real_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = 4100\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.server.port, 4100);
    }

    #[test]
    fn default_command_is_serve() {
        let cli = Cli { command: None };
        assert!(matches!(cli.command(), Command::Serve));
    }
}
