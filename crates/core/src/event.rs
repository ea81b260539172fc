// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Watcher event model.
//!
//! The watcher normalizes raw pod lifecycle events into this closed set so
//! subscriber code stays exhaustive-checkable. Subscribers that only care
//! about one kind match on it; the channel itself is the broad subscription.

use crate::agent::TaskId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of agent lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentEventKind {
    Created,
    Running,
    Completed,
    Failed,
    Deleted,
}

crate::simple_display! {
    AgentEventKind {
        Created => "created",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Deleted => "deleted",
    }
}

/// Normalized agent lifecycle event emitted by a watcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentEvent {
    pub kind: AgentEventKind,
    pub pod_name: String,
    /// Task id read from the pod's labels, when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    /// Raw pod phase, where applicable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    /// Full label map from the pod
    pub labels: BTreeMap<String, String>,
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
