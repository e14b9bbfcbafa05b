mod agents;
mod context;
mod server;
mod sessions;
mod skills;
mod workspace;

pub use agents::AgentConfig;
pub use context::ContextConfig;
pub use server::ServerConfig;
pub use sessions::SessionsConfig;
pub use skills::SkillsConfig;
pub use workspace::WorkspaceConfig;

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

/// Top-level configuration tree, deserialized from TOML at startup.
///
/// Every field carries `#[serde(default)]` so a partial config file is
/// always loadable; `validate()` is the single place that turns "loadable"
/// into "safe to run".
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub skills: SkillsConfig,
    #[serde(default)]
    pub agents: HashMap<String, AgentConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    pub fn load_from_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Runs every ambient sanity check. Does not touch the filesystem or
    /// network — spawn-time failures (missing agent binary) are caught by
    /// the `doctor` CLI command, not here.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.workspace.repo_root.as_os_str().is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "workspace.repo_root".into(),
                message: "must not be empty".into(),
            });
        }
        if self.workspace.workspaces_dir.trim().is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "workspace.workspaces_dir".into(),
                message: "must not be empty".into(),
            });
        }

        if !is_loopback_host(&self.server.host) {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: format!(
                    "must be a loopback address (127.0.0.1, ::1, localhost), got '{}'",
                    self.server.host
                ),
            });
        }
        if self.server.port == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "must be nonzero".into(),
            });
        }

        if self.sessions.timeout_ms == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "sessions.timeout_ms".into(),
                message: "must be nonzero".into(),
            });
        }
        if self.sessions.sweep_interval_ms == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "sessions.sweep_interval_ms".into(),
                message: "sweeper disabled (0ms); expired sessions only removed lazily".into(),
            });
        }

        if self.context.recent_message_limit == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "context.recent_message_limit".into(),
                message: "must be nonzero".into(),
            });
        }
        if self.context.token_limit == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "context.token_limit".into(),
                message: "must be nonzero".into(),
            });
        }

        if self.agents.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "agents".into(),
                message: "no agents configured; the gateway will have nothing to spawn".into(),
            });
        }
        for (name, agent) in &self.agents {
            if agent.command.trim().is_empty() {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    field: format!("agents.{name}.command"),
                    message: "must not be empty".into(),
                });
            }
            if let Err(message) = agent.resolve_credential() {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    field: format!("agents.{name}.credential_env"),
                    message,
                });
            }
        }

        issues
    }
}

fn is_loopback_host(host: &str) -> bool {
    matches!(host, "127.0.0.1" | "::1" | "localhost") || host.starts_with("127.")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut agents = HashMap::new();
        agents.insert(
            "copilot".to_string(),
            AgentConfig {
                command: "gh".into(),
                args: vec!["copilot".into()],
                credential_env: "GITHUB_TOKEN".into(),
                credential: Some("gh_test_token".into()),
            },
        );
        Config {
            workspace: WorkspaceConfig::default(),
            server: ServerConfig::default(),
            sessions: SessionsConfig::default(),
            context: ContextConfig::default(),
            skills: SkillsConfig::default(),
            agents,
        }
    }

    fn find_issue<'a>(issues: &'a [ConfigIssue], field: &str) -> Option<&'a ConfigIssue> {
        issues.iter().find(|i| i.field == field)
    }

    #[test]
    fn default_config_has_no_errors() {
        let issues = valid_config().validate();
        assert!(
            issues.iter().all(|i| i.severity != ConfigSeverity::Error),
            "{issues:?}"
        );
    }

    #[test]
    fn rejects_non_loopback_host() {
        let mut cfg = valid_config();
        cfg.server.host = "0.0.0.0".into();
        let issues = cfg.validate();
        assert!(find_issue(&issues, "server.host").is_some());
    }

    #[test]
    fn warns_on_empty_agents() {
        let mut cfg = valid_config();
        cfg.agents.clear();
        let issues = cfg.validate();
        let issue = find_issue(&issues, "agents").unwrap();
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn rejects_agent_missing_credential() {
        let mut cfg = valid_config();
        cfg.agents.get_mut("copilot").unwrap().credential = None;
        std::env::remove_var("GITHUB_TOKEN");
        let issues = cfg.validate();
        assert!(find_issue(&issues, "agents.copilot.credential_env").is_some());
    }

    #[test]
    fn zero_port_is_an_error() {
        let mut cfg = valid_config();
        cfg.server.port = 0;
        let issues = cfg.validate();
        assert!(find_issue(&issues, "server.port").is_some());
    }

    #[test]
    fn loads_from_toml() {
        let raw = r#"
            [server]
            port = 4000

            [agents.gemini]
            command = "gemini"
            credential_env = "GEMINI_API_KEY"
            credential = "abc"
        "#;
        let cfg = Config::load_from_str(raw).unwrap();
        assert_eq!(cfg.server.port, 4000);
        assert_eq!(cfg.agents["gemini"].command, "gemini");
    }
}
