// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent identity, state, spawn requests, and snapshots.
//!
//! An agent is a single AI-CLI session hosted inside one execution unit
//! (pod, container, SSH host, or local process). The handle returned by
//! spawn is the only durable reference a caller should persist; everything
//! else is recomputed from the live backing infrastructure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

crate::string_id! {
    /// Identifier of the task an agent is working on. Assigned by the caller.
    pub struct TaskId;
}

crate::string_id! {
    /// Identifier of an agent instance.
    ///
    /// Opaque to consumers. The Kubernetes runtime uses the pod name so the
    /// id survives process restarts without a persisted mapping.
    pub struct AgentId;
}

crate::string_id! {
    /// Identifier of a configured runtime (one entry in the runtimes config).
    pub struct RuntimeId;
}

/// State of an agent derived from its execution unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Unit exists but the shell is not confirmed reachable yet
    Starting,
    /// Unit is up and the agent session is live
    Running,
    /// Unit finished successfully
    Completed,
    /// Unit finished with a failure
    Failed,
    /// Torn down by an explicit kill from this process
    Killed,
}

crate::simple_display! {
    AgentState {
        Starting => "starting",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Killed => "killed",
    }
}

impl AgentState {
    /// Map a pod phase to an agent state. Total: unknown phases are treated
    /// as `Starting` rather than invented ones.
    pub fn from_phase(phase: &str) -> Self {
        match phase {
            "Pending" => AgentState::Starting,
            "Running" => AgentState::Running,
            "Succeeded" => AgentState::Completed,
            "Failed" => AgentState::Failed,
            _ => AgentState::Starting,
        }
    }

    /// Whether the agent is still worth tracking (not in a terminal state).
    pub fn is_active(&self) -> bool {
        matches!(self, AgentState::Starting | AgentState::Running)
    }
}

/// Compute resources requested for one agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceSpec {
    /// CPU quantity (e.g. "500m", "2")
    pub cpu: Option<String>,
    /// Memory quantity (e.g. "512Mi", "4Gi")
    pub memory: Option<String>,
    /// GPU count
    pub gpu: Option<i64>,
}

/// Request to spawn a new agent. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Task this agent works on
    pub task_id: TaskId,
    /// Human-readable task name (carried as a pod label)
    pub task_name: String,
    /// AI provider name (e.g. "claude")
    pub provider: String,
    /// Command that launches the provider CLI inside the shell
    pub provider_command: String,
    /// Task prompt delivered as literal input once the CLI is up
    pub prompt: String,
    /// Wait between launching the CLI and delivering the prompt
    pub launch_delay: Option<Duration>,
    /// Working directory for the hosted session
    pub working_dir: Option<String>,
    /// Extra environment variables for the execution unit
    pub env: Vec<(String, String)>,
    /// Compute resources
    pub resources: ResourceSpec,
    /// Caller-supplied extra labels
    pub labels: BTreeMap<String, String>,
}

impl AgentConfig {
    pub fn new(
        task_id: impl Into<TaskId>,
        provider: impl Into<String>,
        provider_command: impl Into<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            task_name: String::new(),
            provider: provider.into(),
            provider_command: provider_command.into(),
            prompt: String::new(),
            launch_delay: None,
            working_dir: None,
            env: Vec::new(),
            resources: ResourceSpec::default(),
            labels: BTreeMap::new(),
        }
    }

    pub fn with_task_name(mut self, name: impl Into<String>) -> Self {
        self.task_name = name.into();
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn with_launch_delay(mut self, delay: Duration) -> Self {
        self.launch_delay = Some(delay);
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }

    pub fn with_resources(mut self, resources: ResourceSpec) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// Durable, opaque reference to a spawned agent.
///
/// A plain value type: all behavior lives on the runtime, keyed by the
/// locator fields. Exactly one runtime-specific locator is set per runtime
/// kind (`pod_name` for Kubernetes). Invalidated the instant the backing
/// unit is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentHandle {
    pub runtime_id: RuntimeId,
    pub agent_id: AgentId,
    pub task_id: TaskId,
    pub created_at: DateTime<Utc>,
    /// Pod locator, set by the Kubernetes runtime only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_name: Option<String>,
}

/// Point-in-time view of an agent: its handle enriched with live state.
///
/// Recomputed from `list_agents()` on every call; never cached and never
/// persisted independently of the handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    #[serde(flatten)]
    pub handle: AgentHandle,
    pub state: AgentState,
    pub task_name: String,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub labels: BTreeMap<String, String>,
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
