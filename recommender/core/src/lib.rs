//! Cluster-state model for the VPA recommender.
//!
//! The model tracks two kinds of objects, keyed by namespace and name:
//!
//! - Each `Vpa` records the pod selector resolved for a `VerticalPodAutoscaler`
//!   along with the diagnostic conditions produced while resolving it.
//! - Each `PodState` records a live pod's labels.
//!
//! ```text
//! [ Vpa ] --selector--> ( labels ) <-- [ PodState ]
//! ```
//!
//! The feeder is the only writer. Readers share the state through a
//! [`SharedClusterState`] and observe whole load passes.

#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod cluster_state;
mod pod;
mod vpa;

pub use self::{
    cluster_state::{ClusterState, ClusterStateError, SharedClusterState},
    pod::{ContainerSpec, PodId, PodPhase, PodState},
    vpa::{ConditionKind, Conditions, Vpa, VpaId},
};
pub use ahash::AHashMap as HashMap;
pub use vpa_recommender_k8s_api::{Labels, Selector, UpdateMode};
