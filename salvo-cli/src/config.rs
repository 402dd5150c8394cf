use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub data_dir: PathBuf,
    /// Account acting as administrative authority for sessions created here.
    pub authority: String,
    pub default_stake_sats: u64,
    pub phase_timeout_hours: u64,
    pub verbose: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("salvo"),
            authority: "registry".to_string(),
            default_stake_sats: 10_000,
            phase_timeout_hours: 24,
            verbose: false,
        }
    }
}

impl CliConfig {
    /// Read `config.json` from the data directory, falling back to defaults.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE);
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))?
        } else {
            Self::default()
        };

        config.data_dir = data_dir.to_path_buf();
        Ok(config)
    }

    pub fn phase_timeout(&self) -> Result<Duration> {
        self.phase_timeout_hours
            .checked_mul(60 * 60)
            .map(Duration::from_secs)
            .with_context(|| {
                format!(
                    "phase_timeout_hours {} is too large",
                    self.phase_timeout_hours
                )
            })
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("salvo.db")
    }

    pub fn client_state_path(&self) -> PathBuf {
        self.data_dir.join("client_state.json")
    }
}
