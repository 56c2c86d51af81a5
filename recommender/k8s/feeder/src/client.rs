use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;
use vpa_recommender_core::{ContainerSpec, Labels, PodId, PodPhase, PodState};
use vpa_recommender_k8s_api::{self as k8s, ListParams, ResourceExt, VerticalPodAutoscaler};

/// Lists the cluster's VPA objects.
#[async_trait]
pub trait VpaLister: Send + Sync {
    async fn list(&self) -> Result<Vec<VerticalPodAutoscaler>>;
}

/// Lists the cluster's pods.
#[async_trait]
pub trait SpecClient: Send + Sync {
    async fn get_pod_specs(&self) -> Result<Vec<BasicPodSpec>>;
}

/// The subset of a pod's spec that the recommender tracks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BasicPodSpec {
    pub id: PodId,
    pub labels: Labels,
    pub phase: PodPhase,
    pub containers: Vec<ContainerSpec>,
}

#[derive(Clone)]
pub struct KubeVpaLister {
    api: k8s::Api<VerticalPodAutoscaler>,
}

#[derive(Clone)]
pub struct KubeSpecClient {
    api: k8s::Api<k8s::Pod>,
}

// === impl BasicPodSpec ===

impl BasicPodSpec {
    pub fn new(id: PodId, labels: Labels) -> Self {
        Self {
            id,
            labels,
            phase: PodPhase::default(),
            containers: Vec::new(),
        }
    }

    /// Returns `None` for pods that lack a namespace or a name.
    pub fn from_pod(pod: k8s::Pod) -> Option<Self> {
        let namespace = pod.metadata.namespace?;
        let pod_name = pod.metadata.name?;
        let phase = pod
            .status
            .and_then(|s| s.phase)
            .map(|p| p.parse().unwrap_or_default())
            .unwrap_or_default();
        let containers = pod
            .spec
            .into_iter()
            .flat_map(|s| s.containers)
            .map(|c| ContainerSpec {
                name: c.name,
                image: c.image,
            })
            .collect();
        Some(Self {
            id: PodId {
                namespace,
                pod_name,
            },
            labels: pod.metadata.labels.into(),
            phase,
            containers,
        })
    }

    pub fn into_pod_state(self) -> PodState {
        PodState {
            id: self.id,
            labels: self.labels,
            phase: self.phase,
            containers: self.containers,
        }
    }
}

// === impl KubeVpaLister ===

impl KubeVpaLister {
    pub fn new(client: k8s::Client, namespace: Option<&str>) -> Self {
        let api = match namespace {
            Some(ns) => k8s::Api::namespaced(client, ns),
            None => k8s::Api::all(client),
        };
        Self { api }
    }
}

#[async_trait]
impl VpaLister for KubeVpaLister {
    async fn list(&self) -> Result<Vec<VerticalPodAutoscaler>> {
        let list = self
            .api
            .list(&ListParams::default())
            .await
            .context("failed to list VerticalPodAutoscalers")?;
        Ok(list.items)
    }
}

// === impl KubeSpecClient ===

impl KubeSpecClient {
    pub fn new(client: k8s::Client) -> Self {
        Self {
            api: k8s::Api::all(client),
        }
    }
}

#[async_trait]
impl SpecClient for KubeSpecClient {
    async fn get_pod_specs(&self) -> Result<Vec<BasicPodSpec>> {
        let list = self
            .api
            .list(&ListParams::default())
            .await
            .context("failed to list pods")?;
        let specs = list
            .items
            .into_iter()
            .filter_map(|pod| {
                let name = pod.name_any();
                let spec = BasicPodSpec::from_pod(pod);
                if spec.is_none() {
                    debug!(%name, "Ignoring pod without a namespace");
                }
                spec
            })
            .collect();
        Ok(specs)
    }
}
