// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kubernetes agent runtime — runs AI-CLI sessions in pods driven over
//! `kubectl exec` + tmux.
//!
//! # Module layout
//!
//! - [`pod`] — pod naming and spec construction
//! - [`pool`] — pre-warmed pod pool with optimistic claim/release
//! - [`watcher`] — pod-event watch with automatic reconnection
//!
//! # Architecture
//!
//! Each agent runs in one pod whose entrypoint starts a detached tmux
//! session named `agent`. The runtime creates pods via the Kubernetes API
//! and drives the hosted shell through a [`TmuxAccessor`] whose exec
//! prefix is `kubectl exec <pod> -n <namespace> --`. No agent state is
//! held in-process: pods (and their labels) are the source of truth, so
//! `reconcile` recovers handles after a restart from a plain list call.

pub mod pod;
pub mod pool;
pub mod watcher;

pub use pool::{K8sPool, PoolStats};
pub use watcher::K8sWatcher;

use crate::contract::{AgentRuntime, RuntimeError, AGENT_SESSION};
use async_trait::async_trait;
use chrono::Utc;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use std::time::Duration;
use tma_core::{
    labels, AgentConfig, AgentHandle, AgentId, AgentInfo, AgentState, K8sRuntimeConfig, RuntimeId,
    TaskId,
};
use tma_mux::TmuxAccessor;

/// Default workspace path inside agent pods.
pub(crate) const DEFAULT_WORKSPACE: &str = "/workspace";

/// Concrete [`AgentRuntime`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct K8sRuntime {
    id: RuntimeId,
    config: K8sRuntimeConfig,
    client: Client,
    pool: Option<K8sPool>,
}

impl K8sRuntime {
    /// Resolve a kube client from the config (kubeconfig file / context /
    /// default chain) and build the runtime. Construction-time only; no
    /// cluster calls are made here.
    pub async fn connect(config: K8sRuntimeConfig) -> Result<Self, RuntimeError> {
        let client = resolve_client(&config).await?;
        Ok(Self::new(config, client))
    }

    /// Build the runtime around an existing client.
    pub fn new(config: K8sRuntimeConfig, client: Client) -> Self {
        Self { id: config.id.clone(), config, client, pool: None }
    }

    /// Enable the warm-pod fast path: `spawn_agent` tries to claim an idle
    /// pool pod before paying pod-creation latency.
    pub fn with_pool(mut self, pool: K8sPool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    fn pods(&self) -> Api<Pod> {
        Api::namespaced(self.client.clone(), &self.config.namespace)
    }

    fn accessor_for(&self, pod_name: &str) -> TmuxAccessor {
        TmuxAccessor::with_exec_prefix(pod_exec_prefix(pod_name, &self.config.namespace))
    }

    fn new_handle(&self, task_id: &TaskId, pod_name: String) -> AgentHandle {
        AgentHandle {
            runtime_id: self.id.clone(),
            agent_id: AgentId::new(pod_name.clone()),
            task_id: task_id.clone(),
            created_at: Utc::now(),
            pod_name: Some(pod_name),
        }
    }

    fn pod_params(&self, pod_name: &str, config: &AgentConfig) -> pod::PodParams {
        let rc = &self.config;
        pod::PodParams {
            pod_name: pod_name.to_string(),
            namespace: rc.namespace.clone(),
            image: rc.image.clone(),
            working_dir: config
                .working_dir
                .clone()
                .unwrap_or_else(|| DEFAULT_WORKSPACE.to_string()),
            cpu: config.resources.cpu.clone().or_else(|| rc.cpu.clone()),
            memory: config.resources.memory.clone().or_else(|| rc.memory.clone()),
            gpu: config
                .resources
                .gpu
                .unwrap_or_else(|| rc.gpu.map(|g| g.count()).unwrap_or(0)),
            storage_class_name: rc.storage_class_name.clone(),
            volume_size: rc.volume_size.clone(),
            node_selector: rc.node_selector.clone(),
            tolerations: rc.tolerations.clone(),
            env: config.env.clone(),
            labels: pod::agent_labels(config),
        }
    }

    /// Create a dedicated pod and launch the agent inside it.
    async fn spawn_dedicated(&self, config: &AgentConfig) -> Result<AgentHandle, RuntimeError> {
        let pod_name = pod::pod_name_for(&config.task_id);
        let pod_spec = pod::build_pod(&self.pod_params(&pod_name, config));
        let pods = self.pods();

        tracing::info!(
            %pod_name,
            task_id = %config.task_id,
            namespace = %self.config.namespace,
            "creating agent pod"
        );

        pods.create(&PostParams::default(), &pod_spec)
            .await
            .map_err(|e| RuntimeError::Provision(format!("pod creation failed: {e}")))?;

        // After pod creation succeeds, any failure must clean up the pod.
        let result = async {
            self.wait_for_running(&pods, &pod_name).await?;
            let mux = self.accessor_for(&pod_name);
            self.wait_for_shell(&mux, &pod_name).await?;
            self.launch(&mux, config).await?;
            Ok(self.new_handle(&config.task_id, pod_name.clone()))
        }
        .await;

        if result.is_err() {
            let dp = DeleteParams::default().grace_period(0);
            if let Err(del_err) = pods.delete(&pod_name, &dp).await {
                tracing::warn!(
                    %pod_name,
                    error = %del_err,
                    "failed to clean up pod after spawn failure"
                );
            }
        }
        result
    }

    /// Launch the agent inside a freshly-claimed pool pod.
    ///
    /// The claim patch only flips the claim labels; the task labels are
    /// patched on here so listing and watching correlate pooled agents the
    /// same way as dedicated ones.
    async fn adopt_claimed(
        &self,
        pod_name: String,
        config: &AgentConfig,
    ) -> Result<AgentHandle, RuntimeError> {
        let patch = serde_json::json!({"metadata": {"labels": pod::agent_labels(config)}});
        self.pods()
            .patch(&pod_name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;

        let result = async {
            let mux = self.accessor_for(&pod_name);
            self.wait_for_shell(&mux, &pod_name).await?;
            self.launch(&mux, config).await?;
            Ok(self.new_handle(&config.task_id, pod_name.clone()))
        }
        .await;

        if result.is_err() {
            if let Some(pool) = &self.pool {
                if let Err(e) = pool.release_pod(&pod_name).await {
                    tracing::warn!(
                        %pod_name,
                        error = %e,
                        "failed to release pool pod after launch failure"
                    );
                }
            }
        }
        result
    }

    /// Wait for the pod to reach phase `Running`.
    async fn wait_for_running(&self, pods: &Api<Pod>, name: &str) -> Result<(), RuntimeError> {
        let poll = poll_interval();
        let attempts = ready_attempts();
        for i in 0..attempts {
            if i > 0 {
                tokio::time::sleep(poll).await;
            }
            let pod = pods.get(name).await?;
            let phase = pod
                .status
                .as_ref()
                .and_then(|s| s.phase.clone())
                .unwrap_or_default();
            match phase.as_str() {
                "Running" => {
                    tracing::debug!(%name, attempt = i, "pod running");
                    return Ok(());
                }
                "Succeeded" | "Failed" => {
                    return Err(RuntimeError::LaunchTimeout(format!(
                        "pod {name} entered terminal phase {phase} before the shell came up"
                    )));
                }
                _ => {}
            }
        }
        Err(RuntimeError::LaunchTimeout(format!(
            "pod {name} not running within {}s",
            (attempts as u64 * poll.as_millis() as u64) / 1000
        )))
    }

    /// Wait for the in-pod tmux session to accept commands.
    async fn wait_for_shell(&self, mux: &TmuxAccessor, name: &str) -> Result<(), RuntimeError> {
        let poll = poll_interval();
        let attempts = shell_attempts();
        for i in 0..attempts {
            if i > 0 {
                tokio::time::sleep(poll).await;
            }
            // A non-zero exit means the exec transport or the session is
            // not up yet; only a spawn failure (no kubectl) is fatal.
            if mux.has_session(AGENT_SESSION).await? {
                tracing::debug!(%name, attempt = i, "agent shell reachable");
                return Ok(());
            }
        }
        Err(RuntimeError::LaunchTimeout(format!(
            "shell in pod {name} not reachable within {}s",
            (attempts as u64 * poll.as_millis() as u64) / 1000
        )))
    }

    /// Start the AI CLI and deliver the task prompt.
    ///
    /// The provider command goes as a non-literal key sequence (so the
    /// trailing `Enter` key is interpreted); the prompt goes literal so
    /// shells and CLIs never interpret its content.
    async fn launch(&self, mux: &TmuxAccessor, config: &AgentConfig) -> Result<(), RuntimeError> {
        mux.send_keys(AGENT_SESSION, &config.provider_command, false).await?;
        mux.send_keys(AGENT_SESSION, "Enter", false).await?;

        if let Some(delay) = config.launch_delay {
            tokio::time::sleep(delay).await;
        }

        if !config.prompt.is_empty() {
            mux.send_keys(AGENT_SESSION, &config.prompt, true).await?;
            mux.send_keys(AGENT_SESSION, "Enter", false).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl AgentRuntime for K8sRuntime {
    fn id(&self) -> &RuntimeId {
        &self.id
    }

    async fn spawn_agent(&self, config: AgentConfig) -> Result<AgentHandle, RuntimeError> {
        let start = std::time::Instant::now();

        if let Some(pool) = &self.pool {
            if let Some(pod_name) = pool.claim_pod(&config.task_id).await? {
                tracing::info!(%pod_name, task_id = %config.task_id, "claimed warm pool pod");
                let result = self.adopt_claimed(pod_name, &config).await;
                log_spawn_outcome(&result, start);
                return result;
            }
        }

        let result = self.spawn_dedicated(&config).await;
        log_spawn_outcome(&result, start);
        result
    }

    async fn kill_agent(&self, handle: &AgentHandle) -> Result<(), RuntimeError> {
        let pod_name = require_pod(handle)?;
        tracing::info!(%pod_name, task_id = %handle.task_id, "deleting agent pod");
        let dp = DeleteParams::default().grace_period(0);
        swallow_not_found(self.pods().delete(pod_name, &dp).await)
    }

    async fn list_agents(&self) -> Result<Vec<AgentInfo>, RuntimeError> {
        let lp = ListParams::default().labels(&labels::agent_selector());
        let list = self.pods().list(&lp).await?;
        Ok(list.items.iter().filter_map(|p| pod_to_info(&self.id, p)).collect())
    }

    fn terminal_accessor(&self, handle: &AgentHandle) -> Result<TmuxAccessor, RuntimeError> {
        let pod_name = require_pod(handle)?;
        Ok(self.accessor_for(pod_name))
    }

    fn attach_command(&self, handle: &AgentHandle) -> Result<String, RuntimeError> {
        let pod_name = require_pod(handle)?;
        Ok(attach_command_for(pod_name, &self.config.namespace))
    }

    async fn ping(&self) -> Result<(), RuntimeError> {
        let lp = ListParams::default().limit(1);
        self.pods().list(&lp).await?;
        Ok(())
    }

    async fn reconcile(&self) -> Result<Vec<AgentHandle>, RuntimeError> {
        let lp = ListParams::default().labels(&labels::agent_selector());
        let list = self.pods().list(&lp).await?;
        let handles = active_handles(&self.id, list.items);
        tracing::info!(count = handles.len(), "reconciled agent handles from cluster");
        Ok(handles)
    }
}

fn log_spawn_outcome(result: &Result<AgentHandle, RuntimeError>, start: std::time::Instant) {
    let elapsed_ms = start.elapsed().as_millis() as u64;
    match result {
        Ok(h) => tracing::info!(agent_id = %h.agent_id, elapsed_ms, "agent spawned"),
        Err(e) => tracing::error!(elapsed_ms, error = %e, "spawn failed"),
    }
}

/// Exec prefix that reaches the shell inside a pod.
pub(crate) fn pod_exec_prefix(pod_name: &str, namespace: &str) -> Vec<String> {
    ["kubectl", "exec", pod_name, "-n", namespace, "--"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Command a human runs to attach to the hosted session.
pub(crate) fn attach_command_for(pod_name: &str, namespace: &str) -> String {
    format!("kubectl exec -it {pod_name} -n {namespace} -- tmux attach -t {AGENT_SESSION}")
}

fn require_pod(handle: &AgentHandle) -> Result<&str, RuntimeError> {
    handle.pod_name.as_deref().ok_or_else(|| {
        RuntimeError::MissingLocator(format!("agent {} has no pod name", handle.agent_id))
    })
}

/// Map a pod to an agent snapshot. Pods without a name are skipped.
pub(crate) fn pod_to_info(runtime_id: &RuntimeId, pod: &Pod) -> Option<AgentInfo> {
    let pod_name = pod.metadata.name.clone()?;
    let pod_labels = pod.metadata.labels.clone().unwrap_or_default();
    let phase = pod.status.as_ref().and_then(|s| s.phase.as_deref()).unwrap_or("");

    let handle = AgentHandle {
        runtime_id: runtime_id.clone(),
        agent_id: AgentId::new(pod_name.clone()),
        task_id: TaskId::new(pod_labels.get(labels::TASK_ID).cloned().unwrap_or_default()),
        created_at: pod
            .metadata
            .creation_timestamp
            .as_ref()
            .map(|t| t.0)
            .unwrap_or_else(Utc::now),
        pod_name: Some(pod_name),
    };

    Some(AgentInfo {
        handle,
        state: AgentState::from_phase(phase),
        task_name: pod_labels.get(labels::TASK_NAME).cloned().unwrap_or_default(),
        provider: pod_labels.get(labels::PROVIDER).cloned().unwrap_or_default(),
        exit_code: exit_code(pod),
        labels: pod_labels,
    })
}

/// Handles for pods still worth tracking, in listing order. Terminal-phase
/// pods are not recovered.
pub(crate) fn active_handles(runtime_id: &RuntimeId, pods: Vec<Pod>) -> Vec<AgentHandle> {
    pods.iter()
        .filter_map(|p| {
            let info = pod_to_info(runtime_id, p)?;
            info.state.is_active().then_some(info.handle)
        })
        .collect()
}

fn exit_code(pod: &Pod) -> Option<i32> {
    pod.status
        .as_ref()?
        .container_statuses
        .as_ref()?
        .iter()
        .find_map(|cs| {
            cs.state
                .as_ref()
                .and_then(|s| s.terminated.as_ref())
                .map(|t| t.exit_code)
        })
}

/// Idempotent-teardown helper: a 404 from the cluster is success.
pub(crate) fn swallow_not_found<T>(result: Result<T, kube::Error>) -> Result<(), RuntimeError> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if is_not_found(&e) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 404)
}

/// A 409 from a patch carrying `resourceVersion` means another writer won.
pub(crate) fn is_conflict(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 409)
}

async fn resolve_client(config: &K8sRuntimeConfig) -> Result<Client, RuntimeError> {
    let client = match (&config.kubeconfig, &config.context) {
        (Some(path), _) => {
            let kubeconfig = Kubeconfig::read_from(path)?;
            let options =
                KubeConfigOptions { context: config.context.clone(), ..Default::default() };
            let conf = kube::Config::from_custom_kubeconfig(kubeconfig, &options).await?;
            Client::try_from(conf)?
        }
        (None, Some(_)) => {
            let options =
                KubeConfigOptions { context: config.context.clone(), ..Default::default() };
            let conf = kube::Config::from_kubeconfig(&options).await?;
            Client::try_from(conf)?
        }
        (None, None) => Client::try_default().await?,
    };
    Ok(client)
}

fn poll_interval() -> Duration {
    let ms = std::env::var("TMA_K8S_READY_POLL_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(500);
    Duration::from_millis(ms)
}

fn ready_attempts() -> u32 {
    std::env::var("TMA_K8S_READY_ATTEMPTS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(240) // 240 * 500ms = 120s for image pull + pod start
}

fn shell_attempts() -> u32 {
    std::env::var("TMA_K8S_SHELL_ATTEMPTS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(120) // 120 * 500ms = 60s for tmux to come up
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
