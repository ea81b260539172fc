// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pod naming and spec construction for Kubernetes agents.

use crate::contract::AGENT_SESSION;
use k8s_openapi::api::core::v1::{
    Container, EmptyDirVolumeSource, EnvVar, EphemeralVolumeSource, PersistentVolumeClaimSpec,
    PersistentVolumeClaimTemplate, Pod, PodSpec, ResourceRequirements, Toleration, Volume,
    VolumeMount, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use tma_core::{labels, AgentConfig, TaskId, TolerationSpec};

/// Parameters for building one agent pod.
pub(crate) struct PodParams {
    pub pod_name: String,
    pub namespace: String,
    pub image: String,
    /// Directory the tmux session is rooted at
    pub working_dir: String,
    pub cpu: Option<String>,
    pub memory: Option<String>,
    /// GPU count; 0 disables GPU scheduling
    pub gpu: i64,
    /// Storage class for the workspace volume; `emptyDir` when absent
    pub storage_class_name: Option<String>,
    /// Workspace volume size, used with `storage_class_name`
    pub volume_size: Option<String>,
    pub node_selector: BTreeMap<String, String>,
    pub tolerations: Vec<TolerationSpec>,
    pub env: Vec<(String, String)>,
    /// Fully-assembled pod labels
    pub labels: BTreeMap<String, String>,
}

/// Derive a pod name from the task id plus a uniqueness suffix.
pub(crate) fn pod_name_for(task_id: &TaskId) -> String {
    let mut task = labels::sanitize(task_id.as_str());
    task.truncate(40);
    let task = task.trim_matches('-');
    let task = if task.is_empty() { "task" } else { task };
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("tmux-agent-{}-{}", task, &suffix[..8])
}

/// Assemble the full label map for an agent pod: the label contract over
/// any caller-supplied extras (contract labels win on collision).
pub(crate) fn agent_labels(config: &AgentConfig) -> BTreeMap<String, String> {
    let mut out = config.labels.clone();
    out.insert(labels::APP.to_string(), labels::APP_VALUE.to_string());
    out.insert(labels::TASK_ID.to_string(), labels::sanitize(config.task_id.as_str()));
    if !config.task_name.is_empty() {
        out.insert(labels::TASK_NAME.to_string(), labels::sanitize(&config.task_name));
    }
    if !config.provider.is_empty() {
        out.insert(labels::PROVIDER.to_string(), labels::sanitize(&config.provider));
    }
    out
}

/// Build a Pod spec for a Kubernetes agent.
pub(crate) fn build_pod(params: &PodParams) -> Pod {
    let workspace_volume = match (&params.storage_class_name, &params.volume_size) {
        (Some(class), Some(size)) => Volume {
            name: "workspace".to_string(),
            ephemeral: Some(EphemeralVolumeSource {
                volume_claim_template: Some(PersistentVolumeClaimTemplate {
                    spec: PersistentVolumeClaimSpec {
                        access_modes: Some(vec!["ReadWriteOnce".to_string()]),
                        storage_class_name: Some(class.clone()),
                        resources: Some(VolumeResourceRequirements {
                            requests: Some(
                                [("storage".to_string(), Quantity(size.clone()))]
                                    .into_iter()
                                    .collect(),
                            ),
                            ..Default::default()
                        }),
                        ..Default::default()
                    },
                    ..Default::default()
                }),
            }),
            ..Default::default()
        },
        _ => Volume {
            name: "workspace".to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        },
    };

    // requests == limits for cpu/memory (Guaranteed QoS); the GPU goes in
    // limits only, which is how the device plugin expects it.
    let mut requests: BTreeMap<String, Quantity> = BTreeMap::new();
    if let Some(cpu) = &params.cpu {
        requests.insert("cpu".to_string(), Quantity(cpu.clone()));
    }
    if let Some(memory) = &params.memory {
        requests.insert("memory".to_string(), Quantity(memory.clone()));
    }
    let mut limits = requests.clone();
    if params.gpu > 0 {
        limits.insert("nvidia.com/gpu".to_string(), Quantity(params.gpu.to_string()));
    }
    let resources = if requests.is_empty() && limits.is_empty() {
        None
    } else {
        Some(ResourceRequirements {
            requests: (!requests.is_empty()).then_some(requests),
            limits: (!limits.is_empty()).then_some(limits),
            ..Default::default()
        })
    };

    let mut node_selector = params.node_selector.clone();
    let mut tolerations: Vec<Toleration> =
        params.tolerations.iter().map(toleration).collect();
    if params.gpu > 0 {
        node_selector.insert("nvidia.com/gpu.present".to_string(), "true".to_string());
        tolerations.push(Toleration {
            key: Some("nvidia.com/gpu".to_string()),
            operator: Some("Exists".to_string()),
            effect: Some("NoSchedule".to_string()),
            ..Default::default()
        });
    }

    let start_cmd = format!(
        "tmux new-session -d -s {AGENT_SESSION} -c {} && exec sleep infinity",
        params.working_dir
    );

    let container = Container {
        name: "agent".to_string(),
        image: Some(params.image.clone()),
        command: Some(vec!["/bin/sh".to_string(), "-c".to_string(), start_cmd]),
        working_dir: Some(params.working_dir.clone()),
        env: Some(params.env.iter().map(|(k, v)| env_var(k, v)).collect()),
        volume_mounts: Some(vec![VolumeMount {
            name: "workspace".to_string(),
            mount_path: super::DEFAULT_WORKSPACE.to_string(),
            ..Default::default()
        }]),
        resources,
        ..Default::default()
    };

    Pod {
        metadata: ObjectMeta {
            name: Some(params.pod_name.clone()),
            namespace: Some(params.namespace.clone()),
            labels: Some(params.labels.clone()),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![container],
            volumes: Some(vec![workspace_volume]),
            node_selector: (!node_selector.is_empty()).then_some(node_selector),
            tolerations: (!tolerations.is_empty()).then_some(tolerations),
            restart_policy: Some("Never".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn env_var(name: &str, value: &str) -> EnvVar {
    EnvVar { name: name.to_string(), value: Some(value.to_string()), ..Default::default() }
}

fn toleration(spec: &TolerationSpec) -> Toleration {
    Toleration {
        key: spec.key.clone(),
        operator: spec.operator.clone(),
        value: spec.value.clone(),
        effect: spec.effect.clone(),
        ..Default::default()
    }
}

#[cfg(test)]
#[path = "pod_tests.rs"]
mod tests;
