// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pod-event watcher.
//!
//! One long-lived watch subscription over the namespace's agent pods,
//! normalized into typed [`AgentEvent`]s on a broadcast channel. A single
//! connection is active at a time; when the stream ends (error or
//! server-side close) the watcher sleeps a fixed delay and reopens,
//! indefinitely, until [`K8sWatcher::stop`] cancels both the in-flight
//! connection and any pending reconnect.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, WatchEvent, WatchParams};
use kube::Client;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tma_core::{labels, AgentEvent, AgentEventKind, TaskId};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Fixed delay between a stream ending and the reconnect attempt.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Broadcast buffer; slow subscribers lose oldest events, not the watcher.
const EVENT_BUFFER: usize = 256;

pub(crate) type WatchStream = BoxStream<'static, Result<WatchEvent<Pod>, kube::Error>>;

/// Seam over `Api<Pod>::watch` so reconnect behavior is testable without a
/// cluster.
#[async_trait]
pub(crate) trait WatchSource: Send + Sync + 'static {
    async fn open(&self) -> Result<WatchStream, kube::Error>;
}

struct ApiWatchSource {
    pods: Api<Pod>,
    selector: String,
}

#[async_trait]
impl WatchSource for ApiWatchSource {
    async fn open(&self) -> Result<WatchStream, kube::Error> {
        let wp = WatchParams::default().labels(&self.selector);
        let stream = self.pods.watch(&wp, "0").await?;
        Ok(stream.boxed())
    }
}

#[derive(Default)]
struct WatcherInner {
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

/// Watcher over a namespace's agent pods.
pub struct K8sWatcher {
    source: Arc<dyn WatchSource>,
    events: broadcast::Sender<AgentEvent>,
    inner: Mutex<WatcherInner>,
}

impl K8sWatcher {
    pub fn new(client: Client, namespace: &str) -> Self {
        let pods: Api<Pod> = Api::namespaced(client, namespace);
        Self::from_source(Arc::new(ApiWatchSource { pods, selector: labels::agent_selector() }))
    }

    fn from_source(source: Arc<dyn WatchSource>) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self { source, events, inner: Mutex::new(WatcherInner::default()) }
    }

    #[cfg(test)]
    pub(crate) fn with_source(source: Arc<dyn WatchSource>) -> Self {
        Self::from_source(source)
    }

    /// Subscribe to normalized events. Every subscriber sees every event
    /// sent after it subscribes; match on `kind` to narrow.
    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.events.subscribe()
    }

    /// Open the watch and start emitting events. A no-op (logged) if the
    /// watcher is already running.
    pub fn start(&self) {
        let mut inner = self.inner.lock();
        if inner.task.as_ref().is_some_and(|t| !t.is_finished()) {
            tracing::warn!("pod watcher already started");
            return;
        }
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_watch_loop(
            self.source.clone(),
            self.events.clone(),
            cancel.clone(),
        ));
        inner.cancel = Some(cancel);
        inner.task = Some(task);
    }

    /// Cancel the in-flight watch and any pending reconnect. The only way
    /// to reach the terminal stopped state.
    pub async fn stop(&self) {
        let (cancel, task) = {
            let mut inner = self.inner.lock();
            (inner.cancel.take(), inner.task.take())
        };
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        if let Some(task) = task {
            let _ = task.await;
        }
        tracing::info!("pod watcher stopped");
    }
}

async fn run_watch_loop(
    source: Arc<dyn WatchSource>,
    events: broadcast::Sender<AgentEvent>,
    cancel: CancellationToken,
) {
    loop {
        let opened = tokio::select! {
            _ = cancel.cancelled() => return,
            res = source.open() => res,
        };

        match opened {
            Ok(mut stream) => {
                tracing::info!("pod watch established");
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        item = stream.next() => match item {
                            Some(Ok(raw)) => {
                                if let Some(event) = normalize(raw) {
                                    // No subscribers is fine
                                    let _ = events.send(event);
                                }
                            }
                            Some(Err(e)) => {
                                tracing::warn!(error = %e, "pod watch stream error");
                                break;
                            }
                            None => {
                                tracing::info!("pod watch stream ended");
                                break;
                            }
                        }
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to open pod watch"),
        }

        // Exactly one reconnect per stream termination, unless stopped
        // before the delay elapses.
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
        }
        tracing::info!(delay_secs = RECONNECT_DELAY.as_secs(), "reconnecting pod watch");
    }
}

/// Normalize a raw watch event. Total and pure: events that do not map to
/// an agent lifecycle transition (bookmarks, in-stream error objects,
/// modifications in uninteresting phases, nameless pods) produce nothing.
pub(crate) fn normalize(event: WatchEvent<Pod>) -> Option<AgentEvent> {
    let (kind, pod) = match event {
        WatchEvent::Added(pod) => (AgentEventKind::Created, pod),
        WatchEvent::Modified(pod) => {
            let kind = match pod_phase(&pod)? {
                "Running" => AgentEventKind::Running,
                "Succeeded" => AgentEventKind::Completed,
                "Failed" => AgentEventKind::Failed,
                _ => return None,
            };
            (kind, pod)
        }
        WatchEvent::Deleted(pod) => (AgentEventKind::Deleted, pod),
        WatchEvent::Bookmark(_) => return None,
        WatchEvent::Error(_) => return None,
    };

    let pod_name = pod.metadata.name.clone()?;
    let phase = pod_phase(&pod).map(str::to_string);
    let pod_labels = pod.metadata.labels.unwrap_or_default();
    let task_id = pod_labels.get(labels::TASK_ID).map(|v| TaskId::new(v.clone()));

    Some(AgentEvent { kind, pod_name, task_id, phase, labels: pod_labels })
}

fn pod_phase(pod: &Pod) -> Option<&str> {
    pod.status.as_ref()?.phase.as_deref()
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
