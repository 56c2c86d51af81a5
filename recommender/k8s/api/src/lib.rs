#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod labels;
pub mod vpa;

pub use self::{
    labels::{InvalidSelector, Labels, Selector},
    vpa::{
        UpdateMode, VerticalPodAutoscaler, VerticalPodAutoscalerSpec, DEFAULT_RECOMMENDER_NAME,
    },
};
pub use k8s_openapi::{
    api::{
        self,
        apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet},
        autoscaling::v1::CrossVersionObjectReference,
        batch::v1::{CronJob, Job},
        core::v1::{Container, Pod, PodSpec, PodStatus, ReplicationController},
    },
    apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement},
    NamespaceResourceScope,
};
pub use kube::{
    api::{Api, ListParams, ObjectMeta, ResourceExt},
    Client, Resource,
};
