// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn task_id_display() {
    let id = TaskId::new("task-123");
    assert_eq!(id.to_string(), "task-123");
    assert_eq!(id.as_str(), "task-123");
}

#[test]
fn agent_id_equality() {
    let id1 = AgentId::new("tmux-agent-a-1");
    let id2 = AgentId::new("tmux-agent-a-1");
    let id3 = AgentId::new("tmux-agent-b-2");

    assert_eq!(id1, id2);
    assert_ne!(id1, id3);
    assert_eq!(id1, "tmux-agent-a-1");
}

#[test]
fn agent_id_serde_transparent() {
    let id = AgentId::new("my-pod");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"my-pod\"");

    let parsed: AgentId = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, id);
}

#[yare::parameterized(
    pending   = { "Pending", AgentState::Starting },
    running   = { "Running", AgentState::Running },
    succeeded = { "Succeeded", AgentState::Completed },
    failed    = { "Failed", AgentState::Failed },
    unknown   = { "Unknown", AgentState::Starting },
    empty     = { "", AgentState::Starting },
    lowercase = { "running", AgentState::Starting },
)]
fn phase_mapping_is_total(phase: &str, expected: AgentState) {
    assert_eq!(AgentState::from_phase(phase), expected);
}

#[test]
fn state_display() {
    assert_eq!(AgentState::Starting.to_string(), "starting");
    assert_eq!(AgentState::Running.to_string(), "running");
    assert_eq!(AgentState::Completed.to_string(), "completed");
    assert_eq!(AgentState::Failed.to_string(), "failed");
    assert_eq!(AgentState::Killed.to_string(), "killed");
}

#[test]
fn active_states() {
    assert!(AgentState::Starting.is_active());
    assert!(AgentState::Running.is_active());
    assert!(!AgentState::Completed.is_active());
    assert!(!AgentState::Failed.is_active());
    assert!(!AgentState::Killed.is_active());
}

#[test]
fn agent_config_setters() {
    let config = AgentConfig::new("task-1", "claude", "claude --model opus")
        .with_task_name("fix-login")
        .with_prompt("Do something")
        .with_launch_delay(std::time::Duration::from_secs(3))
        .with_working_dir("/workspace/app")
        .with_env(vec![("FOO".into(), "bar".into())])
        .with_label("team", "infra");

    assert_eq!(config.task_id, "task-1");
    assert_eq!(config.task_name, "fix-login");
    assert_eq!(config.provider, "claude");
    assert_eq!(config.provider_command, "claude --model opus");
    assert_eq!(config.prompt, "Do something");
    assert_eq!(config.launch_delay, Some(std::time::Duration::from_secs(3)));
    assert_eq!(config.working_dir.as_deref(), Some("/workspace/app"));
    assert_eq!(config.env, vec![("FOO".to_string(), "bar".to_string())]);
    assert_eq!(config.labels.get("team").map(String::as_str), Some("infra"));
}

#[test]
fn handle_serde_round_trip() {
    let handle = AgentHandle {
        runtime_id: RuntimeId::new("k8s-prod"),
        agent_id: AgentId::new("tmux-agent-task-1-abcd1234"),
        task_id: TaskId::new("task-1"),
        created_at: chrono::Utc::now(),
        pod_name: Some("tmux-agent-task-1-abcd1234".to_string()),
    };

    let json = serde_json::to_string(&handle).unwrap();
    let parsed: AgentHandle = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, handle);
}

#[test]
fn handle_without_locator_omits_pod_name() {
    let handle = AgentHandle {
        runtime_id: RuntimeId::new("local"),
        agent_id: AgentId::new("a-1"),
        task_id: TaskId::new("t-1"),
        created_at: chrono::Utc::now(),
        pod_name: None,
    };

    let json = serde_json::to_string(&handle).unwrap();
    assert!(!json.contains("pod_name"));
}
