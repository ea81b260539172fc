// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime and pool configuration.
//!
//! `RuntimeConfig` is a closed tagged union keyed by `type`: unknown
//! runtime kinds are rejected at deserialization time rather than carried
//! as open-ended records. Only the Kubernetes variant has an implementation
//! in this repository; the other variants fix the config surface their
//! runtimes implement elsewhere.

use crate::agent::RuntimeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid pool config: min_size {min_size} exceeds max_size {max_size}")]
    PoolSizeOrder { min_size: i32, max_size: i32 },
    #[error("invalid pool config: sizes must be non-negative (min_size {min_size}, max_size {max_size})")]
    PoolSizeNegative { min_size: i32, max_size: i32 },
}

/// One configured runtime, keyed by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RuntimeConfig {
    Local(LocalRuntimeConfig),
    Ssh(SshRuntimeConfig),
    Docker(DockerRuntimeConfig),
    Kubernetes(K8sRuntimeConfig),
}

impl RuntimeConfig {
    pub fn id(&self) -> &RuntimeId {
        match self {
            RuntimeConfig::Local(c) => &c.id,
            RuntimeConfig::Ssh(c) => &c.id,
            RuntimeConfig::Docker(c) => &c.id,
            RuntimeConfig::Kubernetes(c) => &c.id,
        }
    }

    pub fn enabled(&self) -> bool {
        match self {
            RuntimeConfig::Local(c) => c.enabled,
            RuntimeConfig::Ssh(c) => c.enabled,
            RuntimeConfig::Docker(c) => c.enabled,
            RuntimeConfig::Kubernetes(c) => c.enabled,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RuntimeConfig::Local(_) => "local",
            RuntimeConfig::Ssh(_) => "ssh",
            RuntimeConfig::Docker(_) => "docker",
            RuntimeConfig::Kubernetes(_) => "kubernetes",
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// Local-process runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalRuntimeConfig {
    pub id: RuntimeId,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

/// SSH-host runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshRuntimeConfig {
    pub id: RuntimeId,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub host: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub identity_file: Option<PathBuf>,
}

/// Docker-container runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerRuntimeConfig {
    pub id: RuntimeId,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub image: String,
    #[serde(default)]
    pub network: Option<String>,
}

/// GPU request: a plain `true`/`false` or an explicit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GpuSpec {
    Enabled(bool),
    Count(i64),
}

impl GpuSpec {
    /// Effective GPU count (`true` means one).
    pub fn count(&self) -> i64 {
        match self {
            GpuSpec::Enabled(true) => 1,
            GpuSpec::Enabled(false) => 0,
            GpuSpec::Count(n) => *n,
        }
    }
}

/// Toleration applied to agent pods, mirroring the cluster's model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TolerationSpec {
    pub key: Option<String>,
    pub operator: Option<String>,
    pub value: Option<String>,
    pub effect: Option<String>,
}

/// Kubernetes runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct K8sRuntimeConfig {
    pub id: RuntimeId,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub namespace: String,
    pub image: String,
    /// Kubeconfig file path; in-cluster / default chain when absent
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,
    /// Kubeconfig context to select
    #[serde(default)]
    pub context: Option<String>,
    /// Default CPU for agents that do not request one
    #[serde(default)]
    pub cpu: Option<String>,
    /// Default memory for agents that do not request one
    #[serde(default)]
    pub memory: Option<String>,
    #[serde(default)]
    pub gpu: Option<GpuSpec>,
    /// Storage class for the workspace volume; `emptyDir` when absent
    #[serde(default)]
    pub storage_class_name: Option<String>,
    /// Workspace volume size (e.g. "10Gi"), used with `storage_class_name`
    #[serde(default)]
    pub volume_size: Option<String>,
    #[serde(default)]
    pub node_selector: BTreeMap<String, String>,
    #[serde(default)]
    pub tolerations: Vec<TolerationSpec>,
}

/// Pre-warmed pod pool sizing and pod shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub namespace: String,
    pub image: String,
    pub min_size: i32,
    pub max_size: i32,
    #[serde(default)]
    pub cpu: Option<String>,
    #[serde(default)]
    pub memory: Option<String>,
}

impl PoolConfig {
    /// `min_size ≤ max_size`, both non-negative.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_size < 0 || self.max_size < 0 {
            return Err(ConfigError::PoolSizeNegative {
                min_size: self.min_size,
                max_size: self.max_size,
            });
        }
        if self.min_size > self.max_size {
            return Err(ConfigError::PoolSizeOrder {
                min_size: self.min_size,
                max_size: self.max_size,
            });
        }
        Ok(())
    }

    /// Clamp a scale target into `[min_size, max_size]`. Clamping, not
    /// rejection: callers never need to pre-validate bounds.
    pub fn clamp(&self, target: i32) -> i32 {
        target.max(self.min_size).min(self.max_size)
    }
}

/// Top-level configuration: the set of runtimes plus optional pool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub runtimes: Vec<RuntimeConfig>,
    #[serde(default)]
    pub pool: Option<PoolConfig>,
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        if let Some(pool) = &config.pool {
            pool.validate()?;
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Runtimes with `enabled = true`, in config order.
    pub fn enabled_runtimes(&self) -> impl Iterator<Item = &RuntimeConfig> {
        self.runtimes.iter().filter(|r| r.enabled())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
