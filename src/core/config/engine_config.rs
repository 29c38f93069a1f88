// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Engine Configuration
//!
//! Runtime knobs of the dataflow engine, resolved in layers.
//!
//! ## Configuration Sources (Priority: Low to High)
//!
//! 1. **Rust defaults** - [`EngineConfig::default`]
//! 2. **Configuration file** - TOML or YAML, every section optional
//! 3. **Environment** - `CEPFLOW_*` variables applied by
//!    [`EngineConfig::with_env_overrides`]
//!
//! ## Example
//!
//! ```toml
//! [front_sync]
//! max_iterations = 100000
//!
//! [executor]
//! enabled = true
//! pool_size = 4
//!
//! [pull]
//! timeout_ms = 250
//!
//! [slice]
//! explode_collections = true
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::error::{CepFlowError, CepFlowResult};
use crate::core::query::processor::DEFAULT_MAX_FRONT_ITERATIONS;

pub const ENV_MAX_FRONT_ITERATIONS: &str = "CEPFLOW_MAX_FRONT_ITERATIONS";
pub const ENV_EXECUTOR_THREADS: &str = "CEPFLOW_EXECUTOR_THREADS";
pub const ENV_PULL_TIMEOUT_MS: &str = "CEPFLOW_PULL_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontSyncConfig {
    /// Ceiling on fronts evaluated by one push into a lazy processor.
    pub max_iterations: usize,
}

impl Default for FrontSyncConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_FRONT_ITERATIONS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Dispatch `push_fast` onto a worker pool. Off means every push is
    /// synchronous.
    pub enabled: bool,
    /// Worker count; the number of CPUs when unset.
    pub pool_size: Option<usize>,
    pub thread_name_prefix: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            pool_size: None,
            thread_name_prefix: "cepflow-executor".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullConfig {
    pub timeout_ms: u64,
}

impl Default for PullConfig {
    fn default() -> Self {
        Self { timeout_ms: 1000 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SliceConfig {
    pub explode_collections: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub front_sync: FrontSyncConfig,
    pub executor: ExecutorConfig,
    pub pull: PullConfig,
    pub slice: SliceConfig,
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> CepFlowResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| CepFlowError::configuration(format!("Invalid TOML configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> CepFlowResult<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| CepFlowError::configuration(format!("Invalid YAML configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a `.toml`, `.yaml` or `.yml` file.
    pub fn from_file(path: impl AsRef<Path>) -> CepFlowResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            other => Err(CepFlowError::configuration(format!(
                "Unsupported configuration file extension {:?} for {}",
                other,
                path.display()
            ))),
        }
    }

    /// Apply `CEPFLOW_*` environment variables on top of this configuration.
    ///
    /// `CEPFLOW_EXECUTOR_THREADS` also enables the executor.
    pub fn with_env_overrides(mut self) -> CepFlowResult<Self> {
        if let Some(iterations) = env_parse::<usize>(ENV_MAX_FRONT_ITERATIONS)? {
            self.front_sync.max_iterations = iterations;
        }
        if let Some(threads) = env_parse::<usize>(ENV_EXECUTOR_THREADS)? {
            self.executor.enabled = true;
            self.executor.pool_size = Some(threads);
        }
        if let Some(timeout) = env_parse::<u64>(ENV_PULL_TIMEOUT_MS)? {
            self.pull.timeout_ms = timeout;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> CepFlowResult<()> {
        if self.front_sync.max_iterations == 0 {
            return Err(CepFlowError::configuration_with_key(
                "max_iterations must be at least 1",
                "front_sync.max_iterations",
            ));
        }
        if self.executor.pool_size == Some(0) {
            return Err(CepFlowError::configuration_with_key(
                "pool_size must be at least 1",
                "executor.pool_size",
            ));
        }
        if self.executor.thread_name_prefix.trim().is_empty() {
            return Err(CepFlowError::configuration_with_key(
                "thread_name_prefix must not be empty",
                "executor.thread_name_prefix",
            ));
        }
        if self.pull.timeout_ms == 0 {
            return Err(CepFlowError::configuration_with_key(
                "timeout_ms must be at least 1",
                "pull.timeout_ms",
            ));
        }
        Ok(())
    }

    pub fn pull_timeout(&self) -> Duration {
        Duration::from_millis(self.pull.timeout_ms)
    }

    pub fn effective_pool_size(&self) -> usize {
        self.executor.pool_size.unwrap_or_else(num_cpus::get)
    }
}

fn env_parse<T>(key: &str) -> CepFlowResult<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            CepFlowError::configuration_with_key(format!("Invalid value {raw:?}: {e}"), key)
        }),
        Err(_) => Ok(None),
    }
}
