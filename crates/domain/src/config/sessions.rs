use serde::Deserialize;

fn d_timeout_ms() -> u64 {
    120_000
}

fn d_sweep_interval_ms() -> u64 {
    60_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionsConfig {
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "d_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            timeout_ms: d_timeout_ms(),
            sweep_interval_ms: d_sweep_interval_ms(),
        }
    }
}
