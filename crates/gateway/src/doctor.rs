//! `doctor` CLI command: a read-only set of startup diagnostics, run
//! before `serve` to catch a broken config before it costs a user a
//! confusing 500.

use std::path::Path;

use gw_domain::config::Config;

pub struct CheckResult {
    pub name: String,
    pub ok: bool,
    pub detail: String,
}

fn print_check(check: &CheckResult) {
    let mark = if check.ok { "OK" } else { "FAIL" };
    println!("[{mark}] {}: {}", check.name, check.detail);
}

/// Runs every diagnostic and prints one line per check. Returns `true` iff
/// every check passed — the CLI uses this for its exit code.
pub fn run(config: &Config, config_path: &Path) -> bool {
    let checks = vec![
        check_config_file_exists(config_path),
        check_config_validates(config),
        check_workspace_writable(config),
        check_agents_on_path(config),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>();

    let mut all_ok = true;
    for check in &checks {
        print_check(check);
        all_ok &= check.ok;
    }
    all_ok
}

fn check_config_file_exists(path: &Path) -> Vec<CheckResult> {
    vec![CheckResult {
        name: "config file".into(),
        ok: path.is_file(),
        detail: if path.is_file() {
            format!("found at {}", path.display())
        } else {
            format!("no file at {} (using defaults)", path.display())
        },
    }]
}

fn check_config_validates(config: &Config) -> Vec<CheckResult> {
    let issues = config.validate();
    let errors: Vec<_> = issues
        .iter()
        .filter(|i| i.severity == gw_domain::config::ConfigSeverity::Error)
        .collect();
    let warnings: Vec<_> = issues
        .iter()
        .filter(|i| i.severity == gw_domain::config::ConfigSeverity::Warning)
        .collect();

    let mut results = vec![CheckResult {
        name: "config validation".into(),
        ok: errors.is_empty(),
        detail: if errors.is_empty() {
            format!("no errors ({} warning(s))", warnings.len())
        } else {
            errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; ")
        },
    }];

    for warning in warnings {
        results.push(CheckResult {
            name: format!("config warning: {}", warning.field),
            ok: true,
            detail: warning.message.clone(),
        });
    }
    results
}

fn check_workspace_writable(config: &Config) -> Vec<CheckResult> {
    let root = &config.workspace.repo_root;
    let probe_dir = root.join(&config.workspace.workspaces_dir);
    let result = std::fs::create_dir_all(&probe_dir).and_then(|_| {
        let probe_file = probe_dir.join(".doctor-probe");
        std::fs::write(&probe_file, b"ok")?;
        std::fs::remove_file(&probe_file)
    });

    vec![CheckResult {
        name: "workspace directory".into(),
        ok: result.is_ok(),
        detail: match result {
            Ok(()) => format!("{} is writable", probe_dir.display()),
            Err(e) => format!("{} is not writable: {e}", probe_dir.display()),
        },
    }]
}

fn check_agents_on_path(config: &Config) -> Vec<CheckResult> {
    if config.agents.is_empty() {
        return vec![];
    }
    config
        .agents
        .iter()
        .map(|(name, agent)| {
            let found = command_on_path(&agent.command);
            CheckResult {
                name: format!("agent '{name}' binary"),
                ok: found,
                detail: if found {
                    format!("'{}' found on PATH", agent.command)
                } else {
                    format!("'{}' not found on PATH", agent.command)
                },
            }
        })
        .collect()
}

/// Resolves `command` against `PATH`, the same search order `Command::spawn`
/// itself uses, without actually spawning anything.
fn command_on_path(command: &str) -> bool {
    if command.contains(std::path::MAIN_SEPARATOR) {
        return Path::new(command).is_file();
    }
    let Ok(path_var) = std::env::var("PATH") else {
        return false;
    };
    std::env::split_paths(&path_var).any(|dir| dir.join(command).is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn missing_config_file_is_reported_but_not_fatal() {
        let results = check_config_file_exists(Path::new("/no/such/config.toml"));
        assert!(!results[0].ok);
    }

    #[test]
    fn empty_agents_map_yields_no_agent_checks() {
        let mut config = Config::default();
        config.agents = HashMap::new();
        assert!(check_agents_on_path(&config).is_empty());
    }

    #[test]
    fn workspace_dir_check_creates_and_cleans_up_probe_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.workspace.repo_root = dir.path().to_path_buf();
        let results = check_workspace_writable(&config);
        assert!(results[0].ok);
        assert!(!dir.path().join("workspaces/.doctor-probe").exists());
    }

    #[test]
    fn command_on_path_finds_a_coreutil() {
        assert!(command_on_path("ls") || command_on_path("sh"));
    }

    #[test]
    fn command_on_path_rejects_nonsense() {
        assert!(!command_on_path("gw-doctor-test-nonexistent-binary"));
    }
}
