// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The runtime contract.

use async_trait::async_trait;
use thiserror::Error;
use tma_core::{AgentConfig, AgentHandle, AgentInfo, RuntimeId};
use tma_mux::{MuxError, TmuxAccessor};

/// Name of the tmux session hosting the agent inside every execution unit.
pub const AGENT_SESSION: &str = "agent";

/// Errors from runtime operations.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The execution unit could not be created.
    #[error("provisioning failed: {0}")]
    Provision(String),
    /// The unit was created but its shell never became reachable within
    /// the bounded wait.
    #[error("launch timed out: {0}")]
    LaunchTimeout(String),
    /// The handle lacks the locator this runtime needs (e.g. no pod name).
    #[error("missing runtime locator: {0}")]
    MissingLocator(String),
    /// Driving the hosted terminal session failed.
    #[error("terminal session error: {0}")]
    Session(#[from] MuxError),
    /// Kubeconfig could not be read or resolved at construction time.
    #[error("kubeconfig error: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),
    /// Transport/auth failure from the cluster client, propagated verbatim
    /// so callers can distinguish cluster-down from cluster-empty.
    #[error(transparent)]
    Transport(#[from] kube::Error),
}

/// Contract every runtime variant implements.
///
/// Operations are independent asynchronous calls with no ordering
/// guarantee relative to each other or to watcher events; callers that
/// need "spawn, then observe" correlate by task id or pod name.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Id of this configured runtime.
    fn id(&self) -> &RuntimeId;

    /// Create the execution unit, wait until an interactive shell is
    /// reachable inside it, launch the AI CLI, and deliver the prompt.
    ///
    /// Does not return until the handle's locator is durably known.
    async fn spawn_agent(&self, config: AgentConfig) -> Result<AgentHandle, RuntimeError>;

    /// Idempotent teardown: already-deleted units are success, any other
    /// failure propagates.
    async fn kill_agent(&self, handle: &AgentHandle) -> Result<(), RuntimeError>;

    /// Snapshot of agents this runtime currently backs. Not a subscription.
    async fn list_agents(&self) -> Result<Vec<AgentInfo>, RuntimeError>;

    /// Terminal-multiplexer accessor scoped to the unit behind `handle`.
    fn terminal_accessor(&self, handle: &AgentHandle) -> Result<TmuxAccessor, RuntimeError>;

    /// Shell command a human runs to attach interactively.
    fn attach_command(&self, handle: &AgentHandle) -> Result<String, RuntimeError>;

    /// Liveness/authorization check against the backing infrastructure.
    /// The underlying transport error propagates untouched.
    async fn ping(&self) -> Result<(), RuntimeError>;

    /// Best-effort recovery of agents this runtime previously owned, for
    /// use after a process restart. Read-only: never creates anything.
    async fn reconcile(&self) -> Result<Vec<AgentHandle>, RuntimeError> {
        Ok(Vec::new())
    }
}
