// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn kind_display() {
    assert_eq!(AgentEventKind::Created.to_string(), "created");
    assert_eq!(AgentEventKind::Running.to_string(), "running");
    assert_eq!(AgentEventKind::Completed.to_string(), "completed");
    assert_eq!(AgentEventKind::Failed.to_string(), "failed");
    assert_eq!(AgentEventKind::Deleted.to_string(), "deleted");
}

#[test]
fn kind_serde_snake_case() {
    let json = serde_json::to_string(&AgentEventKind::Completed).unwrap();
    assert_eq!(json, "\"completed\"");
}

#[test]
fn event_serde_round_trip() {
    let event = AgentEvent {
        kind: AgentEventKind::Running,
        pod_name: "tmux-agent-task-1-abcd1234".to_string(),
        task_id: Some(TaskId::new("task-1")),
        phase: Some("Running".to_string()),
        labels: [
            ("app".to_string(), "tmux-agents".to_string()),
            ("task-id".to_string(), "task-1".to_string()),
        ]
        .into_iter()
        .collect(),
    };

    let json = serde_json::to_string(&event).unwrap();
    let parsed: AgentEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, event);
}

#[test]
fn event_without_task_id_omits_field() {
    let event = AgentEvent {
        kind: AgentEventKind::Deleted,
        pod_name: "p".to_string(),
        task_id: None,
        phase: None,
        labels: BTreeMap::new(),
    };

    let json = serde_json::to_string(&event).unwrap();
    assert!(!json.contains("task_id"));
    assert!(!json.contains("phase"));
}
