use k8s_openapi::{
    api::autoscaling::v1::CrossVersionObjectReference,
    apimachinery::pkg::apis::meta::v1::LabelSelector,
};
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// The recommender responsible for VPAs that do not name one.
pub const DEFAULT_RECOMMENDER_NAME: &str = "default";

/// Describes how a set of pods should be vertically autoscaled.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize)]
#[kube(
    group = "autoscaling.k8s.io",
    version = "v1",
    kind = "VerticalPodAutoscaler",
    shortname = "vpa",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct VerticalPodAutoscalerSpec {
    /// Points at the controller that manages the autoscaled pods.
    pub target_ref: Option<CrossVersionObjectReference>,

    /// Selects autoscaled pods by label.
    ///
    /// Only honored by the `v1beta1` API. Objects that still carry it are
    /// reported as unsupported.
    pub selector: Option<LabelSelector>,

    pub update_policy: Option<PodUpdatePolicy>,

    /// Names the recommenders responsible for this object. When empty, only
    /// the default recommender is responsible.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommenders: Vec<RecommenderSelector>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodUpdatePolicy {
    pub update_mode: Option<UpdateMode>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum UpdateMode {
    Off,
    Initial,
    Recreate,
    #[default]
    Auto,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct RecommenderSelector {
    pub name: String,
}

impl VerticalPodAutoscalerSpec {
    pub fn update_mode(&self) -> UpdateMode {
        self.update_policy
            .as_ref()
            .and_then(|p| p.update_mode)
            .unwrap_or_default()
    }

    /// Indicates whether the named recommender is responsible for this object.
    pub fn selects_recommender(&self, name: &str) -> bool {
        if self.recommenders.is_empty() {
            return name == DEFAULT_RECOMMENDER_NAME;
        }
        self.recommenders.iter().any(|r| r.name == name)
    }
}
