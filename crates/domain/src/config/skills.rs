use serde::Deserialize;
use std::path::PathBuf;

fn d_dir() -> PathBuf {
    PathBuf::from("./skills")
}

fn d_gateway_script_path() -> PathBuf {
    PathBuf::from("./skills/skill-gateway.sh")
}

/// Where externally-spawned skill scripts live, and the one script path
/// the agent connector trusts for auto-approving shell tool calls that
/// only ever invoke it.
#[derive(Debug, Clone, Deserialize)]
pub struct SkillsConfig {
    #[serde(default = "d_dir")]
    pub dir: PathBuf,
    #[serde(default = "d_gateway_script_path")]
    pub gateway_script_path: PathBuf,
}

impl Default for SkillsConfig {
    fn default() -> Self {
        Self {
            dir: d_dir(),
            gateway_script_path: d_gateway_script_path(),
        }
    }
}
