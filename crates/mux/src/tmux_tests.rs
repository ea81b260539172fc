// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn s(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
}

#[test]
fn send_keys_non_literal() {
    assert_eq!(
        send_keys_args("agent", "claude --model opus", false),
        s(&["send-keys", "-t", "agent", "claude --model opus"])
    );
}

#[test]
fn send_keys_literal() {
    assert_eq!(
        send_keys_args("agent", "Fix the bug; then run tests", true),
        s(&["send-keys", "-t", "agent", "-l", "Fix the bug; then run tests"])
    );
}

#[test]
fn kill_session_shape() {
    assert_eq!(kill_session_args("agent"), s(&["kill-session", "-t", "agent"]));
}

#[yare::parameterized(
    detached_with_cwd = { false, Some("/workspace"), &["new-session", "-d", "-s", "agent", "-c", "/workspace"] },
    detached_no_cwd   = { false, None, &["new-session", "-d", "-s", "agent"] },
    attached          = { true, Some("/workspace"), &["new-session", "-s", "agent", "-c", "/workspace"] },
)]
fn new_session_shapes(attach: bool, cwd: Option<&str>, expected: &[&str]) {
    assert_eq!(new_session_args("agent", cwd, attach), s(expected));
}

#[test]
fn capture_pane_shape() {
    assert_eq!(
        capture_pane_args("agent", 40),
        s(&["capture-pane", "-t", "agent", "-p", "-S", "-40"])
    );
}

#[test]
fn command_line_without_prefix_runs_tmux_directly() {
    let (program, args) = command_line(&[], &s(&["has-session", "-t", "agent"]));
    assert_eq!(program, "tmux");
    assert_eq!(args, s(&["has-session", "-t", "agent"]));
}

#[test]
fn command_line_with_exec_prefix() {
    let prefix = s(&["kubectl", "exec", "my-pod", "-n", "tmux-agents", "--"]);
    let (program, args) = command_line(&prefix, &s(&["send-keys", "-t", "agent", "hi"]));
    assert_eq!(program, "kubectl");
    assert_eq!(
        args,
        s(&["exec", "my-pod", "-n", "tmux-agents", "--", "tmux", "send-keys", "-t", "agent", "hi"])
    );
}

#[tokio::test]
async fn spawn_failure_surfaces_as_spawn_error() {
    let mux = TmuxAccessor::with_exec_prefix(s(&["definitely-not-a-real-binary-xyz"]));
    let err = mux.send_keys("agent", "hi", false).await.unwrap_err();
    assert!(matches!(err, MuxError::Spawn { .. }), "got {err:?}");
}

#[tokio::test]
async fn has_session_false_on_command_failure() {
    // `false` exits 1 without spawning tmux semantics, which is exactly the
    // CommandFailed path has_session must map to Ok(false).
    let mux = TmuxAccessor::with_exec_prefix(s(&["false", "--"]));
    // prefix program is `false`; it ignores args and exits 1
    let exists = mux.has_session("agent").await.unwrap();
    assert!(!exists);
}
