use serde::Deserialize;

fn d_args() -> Vec<String> {
    Vec::new()
}

/// One external reasoning-agent binary the gateway knows how to spawn.
///
/// `credential` is the config-supplied value; when absent, the env var
/// named by `credential_env` is consulted at spawn time. Neither present is
/// a fatal configuration error, not a silent empty-string env var.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub command: String,
    #[serde(default = "d_args")]
    pub args: Vec<String>,
    pub credential_env: String,
    #[serde(default)]
    pub credential: Option<String>,
}

impl AgentConfig {
    /// Resolves the credential from config, falling back to the environment
    /// variable named by `credential_env`. Returns the literal fatal-error
    /// message spec.md mandates for the two known credential kinds.
    pub fn resolve_credential(&self) -> Result<String, String> {
        if let Some(value) = &self.credential {
            if !value.is_empty() {
                return Ok(value.clone());
            }
        }
        if let Ok(value) = std::env::var(&self.credential_env) {
            if !value.is_empty() {
                return Ok(value);
            }
        }
        Err(missing_credential_message(&self.credential_env))
    }
}

fn missing_credential_message(credential_env: &str) -> String {
    match credential_env {
        "GITHUB_TOKEN" => {
            "GitHub token not configured (set agents.<name>.credential or GITHUB_TOKEN)".to_string()
        }
        "GEMINI_API_KEY" => {
            "Gemini API key not configured (set agents.<name>.credential or GEMINI_API_KEY)"
                .to_string()
        }
        other => format!("credential not configured (set agents.<name>.credential or {other})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_from_config_value() {
        let agent = AgentConfig {
            command: "gh".into(),
            args: vec![],
            credential_env: "GITHUB_TOKEN".into(),
            credential: Some("tok".into()),
        };
        assert_eq!(agent.resolve_credential().unwrap(), "tok");
    }

    #[test]
    fn falls_back_to_env_var() {
        let agent = AgentConfig {
            command: "gemini".into(),
            args: vec![],
            credential_env: "GW_TEST_GEMINI_KEY".into(),
            credential: None,
        };
        std::env::set_var("GW_TEST_GEMINI_KEY", "key-from-env");
        assert_eq!(agent.resolve_credential().unwrap(), "key-from-env");
        std::env::remove_var("GW_TEST_GEMINI_KEY");
    }

    #[test]
    fn missing_github_token_has_exact_message_prefix() {
        let agent = AgentConfig {
            command: "gh".into(),
            args: vec![],
            credential_env: "GITHUB_TOKEN".into(),
            credential: None,
        };
        std::env::remove_var("GITHUB_TOKEN");
        let err = agent.resolve_credential().unwrap_err();
        assert!(err.starts_with("GitHub token not configured"));
    }

    #[test]
    fn missing_gemini_key_has_exact_message_prefix() {
        let agent = AgentConfig {
            command: "gemini".into(),
            args: vec![],
            credential_env: "GEMINI_API_KEY".into(),
            credential: None,
        };
        std::env::remove_var("GEMINI_API_KEY");
        let err = agent.resolve_credential().unwrap_err();
        assert!(err.starts_with("Gemini API key not configured"));
    }
}
