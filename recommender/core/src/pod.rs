use std::{fmt, str::FromStr};
use vpa_recommender_k8s_api::Labels;

/// Uniquely identifies a pod within the cluster.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PodId {
    pub namespace: String,
    pub pod_name: String,
}

/// The cluster-state view of a single pod.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PodState {
    pub id: PodId,
    pub labels: Labels,
    pub phase: PodPhase,
    pub containers: Vec<ContainerSpec>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: Option<String>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    #[default]
    Unknown,
}

// === impl PodId ===

impl PodId {
    pub fn new(namespace: impl Into<String>, pod_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            pod_name: pod_name.into(),
        }
    }
}

impl fmt::Display for PodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.pod_name)
    }
}

// === impl PodState ===

impl PodState {
    pub fn new(id: PodId, labels: Labels) -> Self {
        Self {
            id,
            labels,
            phase: PodPhase::default(),
            containers: Vec::new(),
        }
    }
}

// === impl PodPhase ===

impl FromStr for PodPhase {
    type Err = std::convert::Infallible;

    /// Unrecognized phases are reported as `Unknown`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Pending" => Self::Pending,
            "Running" => Self::Running,
            "Succeeded" => Self::Succeeded,
            "Failed" => Self::Failed,
            _ => Self::Unknown,
        })
    }
}

impl fmt::Display for PodPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}
