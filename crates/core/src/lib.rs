// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tma-core: Data model for the tmux-agents execution runtime.
//!
//! Shared vocabulary between the runtime implementations and their callers:
//! runtime configuration, spawn requests, agent handles and snapshots, the
//! watcher event model, and the pod label contract.

pub mod macros;

pub mod agent;
pub mod config;
pub mod event;
pub mod labels;

pub use agent::{
    AgentConfig, AgentHandle, AgentId, AgentInfo, AgentState, ResourceSpec, RuntimeId, TaskId,
};
pub use config::{
    Config, ConfigError, DockerRuntimeConfig, GpuSpec, K8sRuntimeConfig, LocalRuntimeConfig,
    PoolConfig, RuntimeConfig, SshRuntimeConfig, TolerationSpec,
};
pub use event::{AgentEvent, AgentEventKind};
