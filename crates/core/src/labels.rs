// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pod label contract.
//!
//! These values are read by external tooling that inspects the same pods,
//! so they must stay bit-exact. Every agent pod carries `app=tmux-agents`
//! plus task labels; pool pods additionally carry the claim labels and a
//! stable ownership label the pool Deployment selects on (`pool-claimed`
//! mutates, so the selector cannot use it).

pub const APP: &str = "app";
pub const APP_VALUE: &str = "tmux-agents";

pub const TASK_ID: &str = "task-id";
pub const TASK_NAME: &str = "task-name";
pub const PROVIDER: &str = "provider";

pub const POOL: &str = "pool";
pub const POOL_VALUE: &str = "tmux-agents-pool";
pub const POOL_CLAIMED: &str = "pool-claimed";
pub const POOL_CLAIMED_BY: &str = "pool-claimed-by";

/// Fixed pool Deployment name, the sole discovery key across restarts.
pub const POOL_DEPLOYMENT: &str = "tmux-agents-pool";

/// Selector matching every agent pod in a namespace.
pub fn agent_selector() -> String {
    format!("{APP}={APP_VALUE}")
}

/// Selector matching every pool pod, claimed or not.
pub fn pool_selector() -> String {
    format!("{APP}={APP_VALUE},{POOL}={POOL_VALUE}")
}

/// Selector matching unclaimed pool pods only.
pub fn pool_idle_selector() -> String {
    format!("{APP}={APP_VALUE},{POOL}={POOL_VALUE},{POOL_CLAIMED}=false")
}

/// Sanitize a string for use as a label value or name segment: lowercase
/// alphanumerics and dashes, no leading/trailing dash, at most 63 chars.
pub fn sanitize(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed = out.trim_matches('-');
    let mut result = trimmed.to_string();
    result.truncate(63);
    result
}

#[cfg(test)]
#[path = "labels_tests.rs"]
mod tests;
