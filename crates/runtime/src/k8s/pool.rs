// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pre-warmed pod pool.
//!
//! A Deployment (`tmux-agents-pool`) keeps `min_size..max_size` idle pods
//! running so agents can claim a warm pod instead of paying pod-creation
//! latency. Claiming is guarded by the cluster's resource-version check,
//! not a local lock: claimers may be separate processes, so the patch
//! carries the `resourceVersion` observed at list time and a 409 means
//! another claimer won. `claim_pod` surfaces that as `None`, an expected
//! outcome the caller may retry, never an error.

use super::{
    is_conflict, is_not_found, pod_exec_prefix, swallow_not_found, DEFAULT_WORKSPACE,
};
use crate::contract::{RuntimeError, AGENT_SESSION};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, EmptyDirVolumeSource, Pod, PodSpec, PodTemplateSpec, ResourceRequirements, Volume,
    VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::Client;
use std::collections::BTreeMap;
use tma_core::{labels, PoolConfig, TaskId};
use tma_mux::TmuxAccessor;

/// Idle/claimed breakdown of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub total: usize,
    pub idle: usize,
    pub claimed: usize,
}

/// Pool of pre-warmed agent pods behind a deterministically-named
/// Deployment, discoverable across process restarts.
#[derive(Clone)]
pub struct K8sPool {
    client: Client,
    config: PoolConfig,
}

impl K8sPool {
    pub fn new(client: Client, config: PoolConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    fn pods(&self) -> Api<Pod> {
        Api::namespaced(self.client.clone(), &self.config.namespace)
    }

    fn deployments(&self) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), &self.config.namespace)
    }

    /// Create or update the pool Deployment.
    ///
    /// Update semantics first (image or resources may have changed since
    /// the last run); a 404 means no Deployment exists yet, so create it
    /// fresh with `replicas = min_size`.
    pub async fn initialize(&self) -> Result<(), RuntimeError> {
        self.config.validate().map_err(|e| RuntimeError::Provision(e.to_string()))?;

        let deployments = self.deployments();
        let desired = build_pool_deployment(&self.config);

        match deployments.get(labels::POOL_DEPLOYMENT).await {
            Ok(existing) => {
                tracing::info!(name = labels::POOL_DEPLOYMENT, "updating pool deployment");
                let mut updated = desired;
                updated.metadata.resource_version = existing.metadata.resource_version;
                // Keep the live replica count; scale() owns it after init.
                if let (Some(spec), Some(live)) = (updated.spec.as_mut(), existing.spec.as_ref())
                {
                    spec.replicas = live.replicas.or(spec.replicas);
                }
                deployments
                    .replace(labels::POOL_DEPLOYMENT, &PostParams::default(), &updated)
                    .await
                    .map_err(|e| {
                        RuntimeError::Provision(format!("pool deployment update failed: {e}"))
                    })?;
            }
            Err(e) if is_not_found(&e) => {
                tracing::info!(
                    name = labels::POOL_DEPLOYMENT,
                    replicas = self.config.min_size,
                    "creating pool deployment"
                );
                deployments
                    .create(&PostParams::default(), &desired)
                    .await
                    .map_err(|e| {
                        RuntimeError::Provision(format!("pool deployment create failed: {e}"))
                    })?;
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    /// Claim an idle pool pod for a task.
    ///
    /// Returns `None` when the pool has no idle pod ("no capacity" is an
    /// expected outcome) or when another claimer patched the chosen pod
    /// first (optimistic-concurrency conflict). Callers wanting another
    /// attempt call `claim_pod` again.
    pub async fn claim_pod(&self, task_id: &TaskId) -> Result<Option<String>, RuntimeError> {
        let pods = self.pods();
        let lp = ListParams::default().labels(&labels::pool_idle_selector());
        let list = pods.list(&lp).await?;

        // First idle pod in list order; no fairness guarantee beyond that.
        let Some(pod) = list.items.into_iter().next() else {
            tracing::debug!(task_id = %task_id, "pool has no idle pods");
            return Ok(None);
        };
        let Some(name) = pod.metadata.name else {
            return Ok(None);
        };
        let Some(resource_version) = pod.metadata.resource_version else {
            return Ok(None);
        };

        let patch = claim_patch(task_id, &resource_version);
        match pods.patch(&name, &PatchParams::default(), &Patch::Merge(&patch)).await {
            Ok(_) => {
                tracing::info!(pod_name = %name, task_id = %task_id, "claimed pool pod");
                Ok(Some(name))
            }
            Err(e) if is_conflict(&e) => {
                tracing::debug!(pod_name = %name, task_id = %task_id, "lost claim race");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Return a pod to the pool and reset its hosted session.
    ///
    /// The relabel must complete even if the session reset partially
    /// fails: an un-released pod is a leak, a dirty session is not.
    pub async fn release_pod(&self, pod_name: &str) -> Result<(), RuntimeError> {
        self.pods()
            .patch(pod_name, &PatchParams::default(), &Patch::Merge(&release_patch()))
            .await?;
        tracing::info!(%pod_name, "released pool pod");

        // Best effort from here: kill whatever session the previous task
        // left behind and start a clean one at the default workspace.
        let mux = TmuxAccessor::with_exec_prefix(pod_exec_prefix(pod_name, &self.config.namespace));
        if let Err(e) = mux.kill_session(AGENT_SESSION).await {
            tracing::debug!(%pod_name, error = %e, "no session to kill during release");
        }
        if let Err(e) = mux.new_session(AGENT_SESSION, Some(DEFAULT_WORKSPACE), false).await {
            tracing::warn!(%pod_name, error = %e, "failed to reset session on released pod");
        }
        Ok(())
    }

    /// Scale the pool, clamping the target into `[min_size, max_size]`.
    /// Returns the replica count actually applied.
    pub async fn scale(&self, target: i32) -> Result<i32, RuntimeError> {
        let replicas = self.config.clamp(target);
        let patch = serde_json::json!({"spec": {"replicas": replicas}});
        self.deployments()
            .patch_scale(labels::POOL_DEPLOYMENT, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        tracing::info!(requested = target, applied = replicas, "scaled pool");
        Ok(replicas)
    }

    /// Idle/claimed breakdown. Purely a read.
    pub async fn pool_stats(&self) -> Result<PoolStats, RuntimeError> {
        let lp = ListParams::default().labels(&labels::pool_selector());
        let list = self.pods().list(&lp).await?;
        Ok(partition_stats(&list.items))
    }

    /// Delete the pool Deployment. Already-gone is success.
    pub async fn destroy(&self) -> Result<(), RuntimeError> {
        tracing::info!(name = labels::POOL_DEPLOYMENT, "destroying pool deployment");
        swallow_not_found(
            self.deployments()
                .delete(labels::POOL_DEPLOYMENT, &DeleteParams::default())
                .await,
        )
    }
}

/// Conditional claim patch: the resourceVersion observed at list time is
/// included so the API server rejects the patch with a 409 if any other
/// writer touched the pod since.
pub(crate) fn claim_patch(task_id: &TaskId, resource_version: &str) -> serde_json::Value {
    serde_json::json!({
        "metadata": {
            "resourceVersion": resource_version,
            "labels": {
                (labels::POOL_CLAIMED): "true",
                (labels::POOL_CLAIMED_BY): labels::sanitize(task_id.as_str()),
            }
        }
    })
}

/// Unconditional release patch: back to idle, claim and task labels
/// removed (merge-patch null deletes a key).
pub(crate) fn release_patch() -> serde_json::Value {
    serde_json::json!({
        "metadata": {
            "labels": {
                (labels::POOL_CLAIMED): "false",
                (labels::POOL_CLAIMED_BY): null,
                (labels::TASK_ID): null,
                (labels::TASK_NAME): null,
                (labels::PROVIDER): null,
            }
        }
    })
}

/// Partition pool pods by the `pool-claimed` label.
pub(crate) fn partition_stats(pods: &[Pod]) -> PoolStats {
    let mut stats = PoolStats { total: 0, idle: 0, claimed: 0 };
    for pod in pods {
        stats.total += 1;
        let claimed = pod
            .metadata
            .labels
            .as_ref()
            .and_then(|l| l.get(labels::POOL_CLAIMED))
            .map(|v| v == "true")
            .unwrap_or(false);
        if claimed {
            stats.claimed += 1;
        } else {
            stats.idle += 1;
        }
    }
    stats
}

/// Labels every pool pod starts with.
pub(crate) fn pool_pod_labels() -> BTreeMap<String, String> {
    [
        (labels::APP.to_string(), labels::APP_VALUE.to_string()),
        (labels::POOL.to_string(), labels::POOL_VALUE.to_string()),
        (labels::POOL_CLAIMED.to_string(), "false".to_string()),
    ]
    .into_iter()
    .collect()
}

/// Stable labels the Deployment selects on. `pool-claimed` mutates over a
/// pod's life, so the selector must not include it.
fn pool_selector_labels() -> BTreeMap<String, String> {
    [
        (labels::APP.to_string(), labels::APP_VALUE.to_string()),
        (labels::POOL.to_string(), labels::POOL_VALUE.to_string()),
    ]
    .into_iter()
    .collect()
}

/// Build the pool Deployment spec.
pub(crate) fn build_pool_deployment(config: &PoolConfig) -> Deployment {
    let mut requests: BTreeMap<String, Quantity> = BTreeMap::new();
    if let Some(cpu) = &config.cpu {
        requests.insert("cpu".to_string(), Quantity(cpu.clone()));
    }
    if let Some(memory) = &config.memory {
        requests.insert("memory".to_string(), Quantity(memory.clone()));
    }
    let resources = (!requests.is_empty()).then(|| ResourceRequirements {
        limits: Some(requests.clone()),
        requests: Some(requests),
        ..Default::default()
    });

    let start_cmd = format!(
        "tmux new-session -d -s {AGENT_SESSION} -c {DEFAULT_WORKSPACE} && exec sleep infinity"
    );

    let container = Container {
        name: "agent".to_string(),
        image: Some(config.image.clone()),
        command: Some(vec!["/bin/sh".to_string(), "-c".to_string(), start_cmd]),
        working_dir: Some(DEFAULT_WORKSPACE.to_string()),
        volume_mounts: Some(vec![VolumeMount {
            name: "workspace".to_string(),
            mount_path: DEFAULT_WORKSPACE.to_string(),
            ..Default::default()
        }]),
        resources,
        ..Default::default()
    };

    Deployment {
        metadata: ObjectMeta {
            name: Some(labels::POOL_DEPLOYMENT.to_string()),
            namespace: Some(config.namespace.clone()),
            labels: Some(pool_selector_labels()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(config.min_size),
            selector: LabelSelector {
                match_labels: Some(pool_selector_labels()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(pool_pod_labels()),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    volumes: Some(vec![Volume {
                        name: "workspace".to_string(),
                        empty_dir: Some(EmptyDirVolumeSource::default()),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
