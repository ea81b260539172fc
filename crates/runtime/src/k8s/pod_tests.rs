// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tma_core::ResourceSpec;

fn base_params() -> PodParams {
    PodParams {
        pod_name: "tmux-agent-task-123-abcd1234".to_string(),
        namespace: "tmux-agents".to_string(),
        image: "ghcr.io/example/tmux-agent:latest".to_string(),
        working_dir: "/workspace".to_string(),
        cpu: None,
        memory: None,
        gpu: 0,
        storage_class_name: None,
        volume_size: None,
        node_selector: BTreeMap::new(),
        tolerations: Vec::new(),
        env: Vec::new(),
        labels: BTreeMap::new(),
    }
}

#[test]
fn pod_name_derives_from_task_id() {
    let name = pod_name_for(&TaskId::new("task-123"));
    assert!(name.starts_with("tmux-agent-task-123-"), "got {name}");
    let suffix = &name["tmux-agent-task-123-".len()..];
    assert_eq!(suffix.len(), 8);
    assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn pod_names_are_unique_per_call() {
    let id = TaskId::new("task-123");
    assert_ne!(pod_name_for(&id), pod_name_for(&id));
}

#[test]
fn pod_name_sanitizes_hostile_task_ids() {
    let name = pod_name_for(&TaskId::new("Fix Login/Bug!"));
    assert!(name.starts_with("tmux-agent-fix-login-bug-"), "got {name}");
}

#[test]
fn pod_name_handles_empty_task_id() {
    let name = pod_name_for(&TaskId::new(""));
    assert!(name.starts_with("tmux-agent-task-"), "got {name}");
}

#[test]
fn agent_labels_carry_the_contract() {
    let config = AgentConfig::new("task-7", "claude", "claude")
        .with_task_name("Fix login")
        .with_label("team", "infra");
    let labels = agent_labels(&config);

    assert_eq!(labels.get("app").map(String::as_str), Some("tmux-agents"));
    assert_eq!(labels.get("task-id").map(String::as_str), Some("task-7"));
    assert_eq!(labels.get("task-name").map(String::as_str), Some("fix-login"));
    assert_eq!(labels.get("provider").map(String::as_str), Some("claude"));
    assert_eq!(labels.get("team").map(String::as_str), Some("infra"));
}

#[test]
fn contract_labels_win_over_caller_labels() {
    let config = AgentConfig::new("task-7", "claude", "claude").with_label("app", "impostor");
    let labels = agent_labels(&config);
    assert_eq!(labels.get("app").map(String::as_str), Some("tmux-agents"));
}

#[test]
fn requests_equal_limits_for_cpu_and_memory() {
    let mut params = base_params();
    params.cpu = Some("500m".to_string());
    params.memory = Some("2Gi".to_string());

    let pod = build_pod(&params);
    let resources = pod.spec.unwrap().containers[0].resources.clone().unwrap();
    let requests = resources.requests.unwrap();
    let limits = resources.limits.unwrap();

    assert_eq!(requests.get("cpu"), Some(&Quantity("500m".to_string())));
    assert_eq!(requests.get("memory"), Some(&Quantity("2Gi".to_string())));
    assert_eq!(requests.get("cpu"), limits.get("cpu"));
    assert_eq!(requests.get("memory"), limits.get("memory"));
}

#[test]
fn no_resources_requested_leaves_resources_unset() {
    let pod = build_pod(&base_params());
    assert!(pod.spec.unwrap().containers[0].resources.is_none());
}

#[test]
fn gpu_adds_limit_selector_and_toleration() {
    let mut params = base_params();
    params.gpu = 2;

    let pod = build_pod(&params);
    let spec = pod.spec.unwrap();

    let resources = spec.containers[0].resources.clone().unwrap();
    assert_eq!(
        resources.limits.unwrap().get("nvidia.com/gpu"),
        Some(&Quantity("2".to_string()))
    );
    // GPU is a limit, not a request
    assert!(resources.requests.is_none());

    let selector = spec.node_selector.unwrap();
    assert_eq!(selector.get("nvidia.com/gpu.present").map(String::as_str), Some("true"));

    let tolerations = spec.tolerations.unwrap();
    let gpu_toleration = tolerations
        .iter()
        .find(|t| t.key.as_deref() == Some("nvidia.com/gpu"))
        .unwrap();
    assert_eq!(gpu_toleration.operator.as_deref(), Some("Exists"));
    assert_eq!(gpu_toleration.effect.as_deref(), Some("NoSchedule"));
}

#[test]
fn runtime_node_selector_and_tolerations_are_merged() {
    let mut params = base_params();
    params.gpu = 1;
    params.node_selector.insert("workload".to_string(), "agents".to_string());
    params.tolerations.push(TolerationSpec {
        key: Some("dedicated".to_string()),
        operator: Some("Equal".to_string()),
        value: Some("agents".to_string()),
        effect: Some("NoSchedule".to_string()),
    });

    let pod = build_pod(&params);
    let spec = pod.spec.unwrap();

    let selector = spec.node_selector.unwrap();
    assert_eq!(selector.len(), 2);
    assert_eq!(selector.get("workload").map(String::as_str), Some("agents"));

    let tolerations = spec.tolerations.unwrap();
    assert_eq!(tolerations.len(), 2);
    assert_eq!(tolerations[0].key.as_deref(), Some("dedicated"));
}

#[test]
fn workspace_defaults_to_empty_dir() {
    let pod = build_pod(&base_params());
    let volumes = pod.spec.unwrap().volumes.unwrap();
    assert_eq!(volumes.len(), 1);
    assert!(volumes[0].empty_dir.is_some());
    assert!(volumes[0].ephemeral.is_none());
}

#[test]
fn storage_class_switches_to_ephemeral_claim() {
    let mut params = base_params();
    params.storage_class_name = Some("fast-ssd".to_string());
    params.volume_size = Some("10Gi".to_string());

    let pod = build_pod(&params);
    let volumes = pod.spec.unwrap().volumes.unwrap();
    let claim = volumes[0]
        .ephemeral
        .clone()
        .unwrap()
        .volume_claim_template
        .unwrap();
    assert_eq!(claim.spec.storage_class_name.as_deref(), Some("fast-ssd"));
    let requests = claim.spec.resources.unwrap().requests.unwrap();
    assert_eq!(requests.get("storage"), Some(&Quantity("10Gi".to_string())));
}

#[test]
fn container_starts_tmux_session() {
    let pod = build_pod(&base_params());
    let spec = pod.spec.unwrap();
    assert_eq!(spec.restart_policy.as_deref(), Some("Never"));

    let command = spec.containers[0].command.clone().unwrap();
    assert_eq!(command[0], "/bin/sh");
    assert!(command[2].contains("tmux new-session -d -s agent -c /workspace"));
}

#[test]
fn env_is_forwarded() {
    let mut params = base_params();
    params.env = vec![("ANTHROPIC_API_KEY".to_string(), "sk-test".to_string())];

    let pod = build_pod(&params);
    let env = pod.spec.unwrap().containers[0].env.clone().unwrap();
    assert_eq!(env[0].name, "ANTHROPIC_API_KEY");
    assert_eq!(env[0].value.as_deref(), Some("sk-test"));
}

#[test]
fn metadata_carries_name_namespace_labels() {
    let mut params = base_params();
    params.labels = agent_labels(&AgentConfig::new("task-123", "claude", "claude"));

    let pod = build_pod(&params);
    assert_eq!(pod.metadata.name.as_deref(), Some("tmux-agent-task-123-abcd1234"));
    assert_eq!(pod.metadata.namespace.as_deref(), Some("tmux-agents"));
    let labels = pod.metadata.labels.unwrap();
    assert_eq!(labels.get("app").map(String::as_str), Some("tmux-agents"));
    assert_eq!(labels.get("task-id").map(String::as_str), Some("task-123"));
}

#[test]
fn resources_from_agent_spec_shape() {
    // ResourceSpec carries what callers send; the mapping to quantities is
    // exercised through PodParams above. This pins the default.
    assert_eq!(ResourceSpec::default(), ResourceSpec { cpu: None, memory: None, gpu: None });
}
