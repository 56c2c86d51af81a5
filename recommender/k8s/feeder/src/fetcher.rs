use async_trait::async_trait;
use std::fmt;
use tracing::trace;
use vpa_recommender_core::Selector;
use vpa_recommender_k8s_api::{
    self as k8s, CrossVersionObjectReference, InvalidSelector, LabelSelector, ResourceExt,
    VerticalPodAutoscaler,
};

/// Produces the selector for the pods governed by a VPA.
#[async_trait]
pub trait SelectorFetcher: Send + Sync {
    /// Returns `Ok(None)` when the VPA does not configure this kind of selector.
    async fn fetch(&self, vpa: &VerticalPodAutoscaler) -> Result<Option<Selector>, FetchError>;
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("targetRef not defined")]
    TargetRefNotDefined,

    #[error("unsupported targetRef kind {0:?}")]
    UnsupportedKind(String),

    #[error("invalid selector: {0}")]
    InvalidSelector(#[from] InvalidSelector),

    #[error(transparent)]
    Kube(#[from] kube::Error),
}

/// Reads the label selector set directly on the VPA by the `v1beta1` API.
#[derive(Clone, Debug, Default)]
pub struct LegacySelectorFetcher(());

/// Reads the selector of the controller that a VPA's `targetRef` points at.
#[derive(Clone)]
pub struct TargetRefSelectorFetcher {
    client: k8s::Client,
}

// === impl LegacySelectorFetcher ===

impl LegacySelectorFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SelectorFetcher for LegacySelectorFetcher {
    async fn fetch(&self, vpa: &VerticalPodAutoscaler) -> Result<Option<Selector>, FetchError> {
        convert(vpa.spec.selector.as_ref())
    }
}

// === impl TargetRefSelectorFetcher ===

impl TargetRefSelectorFetcher {
    pub fn new(client: k8s::Client) -> Self {
        Self { client }
    }

    async fn get<T>(&self, ns: &str, name: &str) -> Result<T, FetchError>
    where
        T: k8s::Resource<Scope = k8s::NamespaceResourceScope, DynamicType = ()>,
        T: Clone + fmt::Debug + serde::de::DeserializeOwned,
    {
        let api = k8s::Api::<T>::namespaced(self.client.clone(), ns);
        Ok(api.get(name).await?)
    }

    /// Looks up the target's selector by kind. Pod-template labels stand in
    /// for kinds whose spec has no selector of its own.
    async fn target_selector(
        &self,
        ns: &str,
        target: &CrossVersionObjectReference,
    ) -> Result<Option<LabelSelector>, FetchError> {
        let name = target.name.as_str();
        let selector = match target.kind.as_str() {
            "Deployment" => self
                .get::<k8s::Deployment>(ns, name)
                .await?
                .spec
                .map(|s| s.selector),
            "ReplicaSet" => self
                .get::<k8s::ReplicaSet>(ns, name)
                .await?
                .spec
                .map(|s| s.selector),
            "StatefulSet" => self
                .get::<k8s::StatefulSet>(ns, name)
                .await?
                .spec
                .map(|s| s.selector),
            "DaemonSet" => self
                .get::<k8s::DaemonSet>(ns, name)
                .await?
                .spec
                .map(|s| s.selector),
            "ReplicationController" => self
                .get::<k8s::ReplicationController>(ns, name)
                .await?
                .spec
                .and_then(|s| s.selector)
                .map(match_labels),
            "Job" => self
                .get::<k8s::Job>(ns, name)
                .await?
                .spec
                .and_then(|s| s.selector),
            "CronJob" => self
                .get::<k8s::CronJob>(ns, name)
                .await?
                .spec
                .and_then(|s| s.job_template.spec)
                .and_then(|s| s.template.metadata)
                .and_then(|m| m.labels)
                .map(match_labels),
            kind => return Err(FetchError::UnsupportedKind(kind.to_string())),
        };
        Ok(selector)
    }
}

#[async_trait]
impl SelectorFetcher for TargetRefSelectorFetcher {
    async fn fetch(&self, vpa: &VerticalPodAutoscaler) -> Result<Option<Selector>, FetchError> {
        let target = vpa
            .spec
            .target_ref
            .as_ref()
            .ok_or(FetchError::TargetRefNotDefined)?;
        let ns = vpa.namespace().unwrap_or_default();
        trace!(%ns, kind = %target.kind, name = %target.name, "Fetching target selector");
        let selector = self.target_selector(&ns, target).await?;
        convert(selector.as_ref())
    }
}

fn match_labels(labels: std::collections::BTreeMap<String, String>) -> LabelSelector {
    LabelSelector {
        match_labels: Some(labels),
        match_expressions: None,
    }
}

fn convert(selector: Option<&LabelSelector>) -> Result<Option<Selector>, FetchError> {
    selector
        .map(Selector::try_from)
        .transpose()
        .map_err(Into::into)
}
