use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::estimate::DEFAULT_TOKEN_BUDGET;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub journal: JournalConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContextConfig {
    #[serde(default = "default_token_budget")]
    pub total_token_budget: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            total_token_budget: DEFAULT_TOKEN_BUDGET,
        }
    }
}

fn default_token_budget() -> usize {
    DEFAULT_TOKEN_BUDGET
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    /// Failed replays allowed before an operation moves to the dead
    /// letters. Zero dead-letters an operation on its first failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_drain_interval_secs")]
    pub drain_interval_secs: u64,
    #[serde(default = "default_dead_letter_cap")]
    pub dead_letter_cap: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            drain_interval_secs: 30,
            dead_letter_cap: 64,
        }
    }
}

fn default_max_retries() -> u32 {
    3
}
fn default_drain_interval_secs() -> u64 {
    30
}
fn default_dead_letter_cap() -> usize {
    64
}

#[derive(Debug, Deserialize, Clone)]
pub struct JournalConfig {
    #[serde(default = "default_journal_path")]
    pub path: PathBuf,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            path: default_journal_path(),
        }
    }
}

fn default_journal_path() -> PathBuf {
    PathBuf::from("data/draftloom.sqlite")
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate context
    if config.context.total_token_budget == 0 {
        anyhow::bail!("context.total_token_budget must be > 0");
    }

    // Validate sync
    if config.sync.drain_interval_secs == 0 {
        anyhow::bail!("sync.drain_interval_secs must be > 0");
    }
    if config.sync.dead_letter_cap == 0 {
        anyhow::bail!("sync.dead_letter_cap must be >= 1");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.context.total_token_budget, DEFAULT_TOKEN_BUDGET);
        assert_eq!(config.sync.max_retries, 3);
        assert_eq!(config.sync.drain_interval_secs, 30);
        assert_eq!(config.sync.dead_letter_cap, 64);
        assert_eq!(config.journal.path, PathBuf::from("data/draftloom.sqlite"));
    }

    #[test]
    fn test_partial_override_keeps_other_defaults() {
        let config: Config =
            toml::from_str("[sync]\nmax_retries = 5\n\n[context]\ntotal_token_budget = 4000\n")
                .unwrap();
        assert_eq!(config.sync.max_retries, 5);
        assert_eq!(config.sync.drain_interval_secs, 30);
        assert_eq!(config.context.total_token_budget, 4000);
    }

    #[test]
    fn test_zero_budget_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[context]\ntotal_token_budget = 0").unwrap();
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_zero_max_retries_allowed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[sync]\nmax_retries = 0").unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.sync.max_retries, 0);
    }

    #[test]
    fn test_load_config_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[sync]\ndrain_interval_secs = 10").unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.sync.drain_interval_secs, 10);
    }
}
