// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tma-runtime: the polymorphic agent-runtime contract and its Kubernetes
//! implementation.
//!
//! # Architecture
//!
//! [`AgentRuntime`] is the contract every runtime variant (local, SSH,
//! container, pod) implements. This crate ships the Kubernetes one:
//!
//! - [`k8s::K8sRuntime`] — pod lifecycle: spawn (create pod, wait for the
//!   hosted shell, launch the AI CLI, deliver the prompt), kill, list,
//!   reconcile after process restart.
//! - [`k8s::K8sPool`] — a Deployment of pre-warmed idle pods with
//!   optimistic claim/release, for low-latency acquisition.
//! - [`k8s::K8sWatcher`] — a long-lived pod watch normalized into typed
//!   [`tma_core::AgentEvent`]s with automatic reconnection.
//!
//! The process holds no authoritative state: every read is a fresh
//! list/get against the cluster, and handles are recoverable from pod
//! labels alone.

mod contract;
pub mod k8s;

pub use contract::{AgentRuntime, RuntimeError, AGENT_SESSION};
pub use k8s::{K8sPool, K8sRuntime, K8sWatcher, PoolStats};
