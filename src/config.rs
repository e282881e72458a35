use crate::error::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::thread;

/// Settings used to build a [`WorkerPool`](crate::WorkerPool).
///
/// ```
/// use syncpool::config::PoolConfig;
///
/// let config = PoolConfig::from_json(r#"{ "threads": 4 }"#).unwrap();
/// assert_eq!(config.resolved_threads(), 4);
/// assert_eq!(config.name, "syncpool");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// number of workers, 0 picks one per hardware thread
    pub threads: usize,
    /// prefix of every worker thread name
    pub name: String,
}

impl PoolConfig {
    pub const DEFAULT_NAME: &'static str = "syncpool";
    // used when the hardware concurrency cannot be queried
    const FALLBACK_THREADS: usize = 2;

    pub fn new(threads: usize) -> Self {
        PoolConfig {
            threads,
            ..PoolConfig::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: PoolConfig =
            serde_json::from_str(json).map_err(|err| Error::config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        PoolConfig::from_json(&content)
    }

    pub fn resolved_threads(&self) -> usize {
        if self.threads != 0 {
            return self.threads;
        }
        thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(Self::FALLBACK_THREADS)
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::config("thread name must not be empty".to_string()));
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            threads: 0,
            name: Self::DEFAULT_NAME.to_string(),
        }
    }
}
