use serde::Deserialize;
use std::path::PathBuf;

fn d_repo_root() -> PathBuf {
    PathBuf::from(".")
}

fn d_workspaces_dir() -> String {
    "workspaces".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default = "d_repo_root")]
    pub repo_root: PathBuf,
    #[serde(default = "d_workspaces_dir")]
    pub workspaces_dir: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            repo_root: d_repo_root(),
            workspaces_dir: d_workspaces_dir(),
        }
    }
}
