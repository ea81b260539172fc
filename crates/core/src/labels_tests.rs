// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn selectors_are_bit_exact() {
    assert_eq!(agent_selector(), "app=tmux-agents");
    assert_eq!(pool_selector(), "app=tmux-agents,pool=tmux-agents-pool");
    assert_eq!(
        pool_idle_selector(),
        "app=tmux-agents,pool=tmux-agents-pool,pool-claimed=false"
    );
}

#[test]
fn deployment_name_is_fixed() {
    assert_eq!(POOL_DEPLOYMENT, "tmux-agents-pool");
}

#[yare::parameterized(
    passthrough  = { "task-123", "task-123" },
    uppercase    = { "Task-123", "task-123" },
    spaces       = { "Fix login bug", "fix-login-bug" },
    symbols      = { "feat/login_v2", "feat-login-v2" },
    edge_dashes  = { "--x--", "x" },
    collapse     = { "a//b", "a-b" },
    empty        = { "", "" },
)]
fn sanitize_label_values(input: &str, expected: &str) {
    assert_eq!(sanitize(input), expected);
}

#[test]
fn sanitize_bounds_length() {
    let long = "x".repeat(200);
    assert_eq!(sanitize(&long).len(), 63);
}
