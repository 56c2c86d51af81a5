use crate::{PodId, PodState, Vpa, VpaId};
use ahash::AHashMap as HashMap;
use parking_lot::RwLock;
use std::sync::Arc;

pub type SharedClusterState = Arc<RwLock<ClusterState>>;

/// Holds every tracked VPA and pod.
///
/// VPAs and pods never hold references to one another: membership is always
/// derived by evaluating a VPA's selector against a pod's labels, so either
/// side may be removed without leaving a dangling edge.
#[derive(Debug, Default)]
pub struct ClusterState {
    vpas: HashMap<VpaId, Vpa>,
    pods: HashMap<PodId, PodState>,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ClusterStateError {
    #[error("VPA {0} is not tracked")]
    VpaNotFound(VpaId),

    #[error("pod {0} is not tracked")]
    PodNotFound(PodId),
}

// === impl ClusterState ===

impl ClusterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedClusterState {
        Arc::new(RwLock::new(Self::new()))
    }

    pub fn vpas(&self) -> &HashMap<VpaId, Vpa> {
        &self.vpas
    }

    pub fn pods(&self) -> &HashMap<PodId, PodState> {
        &self.pods
    }

    pub fn vpa(&self, id: &VpaId) -> Option<&Vpa> {
        self.vpas.get(id)
    }

    pub fn pod(&self, id: &PodId) -> Option<&PodState> {
        self.pods.get(id)
    }

    /// Stores a VPA, returning the record it replaces.
    pub fn add_or_update_vpa(&mut self, vpa: Vpa) -> Option<Vpa> {
        self.vpas.insert(vpa.id.clone(), vpa)
    }

    pub fn delete_vpa(&mut self, id: &VpaId) -> Result<Vpa, ClusterStateError> {
        self.vpas
            .remove(id)
            .ok_or_else(|| ClusterStateError::VpaNotFound(id.clone()))
    }

    /// Stores a pod, returning the record it replaces.
    pub fn add_or_update_pod(&mut self, pod: PodState) -> Option<PodState> {
        self.pods.insert(pod.id.clone(), pod)
    }

    pub fn delete_pod(&mut self, id: &PodId) -> Result<PodState, ClusterStateError> {
        self.pods
            .remove(id)
            .ok_or_else(|| ClusterStateError::PodNotFound(id.clone()))
    }

    /// Replaces the full set of VPAs, returning the ids that are no longer tracked.
    pub fn replace_vpas(&mut self, vpas: HashMap<VpaId, Vpa>) -> Vec<VpaId> {
        let prior = std::mem::replace(&mut self.vpas, vpas);
        prior
            .into_iter()
            .filter_map(|(id, _)| (!self.vpas.contains_key(&id)).then_some(id))
            .collect()
    }

    /// Replaces the full set of pods, returning the ids that are no longer tracked.
    pub fn replace_pods(&mut self, pods: HashMap<PodId, PodState>) -> Vec<PodId> {
        let prior = std::mem::replace(&mut self.pods, pods);
        prior
            .into_iter()
            .filter_map(|(id, _)| (!self.pods.contains_key(&id)).then_some(id))
            .collect()
    }

    /// Returns the VPAs whose selectors match the given pod.
    pub fn vpas_selecting<'a>(&'a self, pod: &PodId) -> impl Iterator<Item = &'a Vpa> + 'a {
        let labels = self.pods.get(pod).map(|p| p.labels.clone());
        self.vpas
            .values()
            .filter(move |vpa| labels.as_ref().is_some_and(|l| vpa.matches(l)))
    }

    /// Returns the pods matched by the given VPA's selector.
    pub fn pods_selected_by<'a>(
        &'a self,
        vpa: &VpaId,
    ) -> impl Iterator<Item = &'a PodState> + 'a {
        let vpa = self.vpas.get(vpa);
        self.pods
            .values()
            .filter(move |pod| vpa.is_some_and(|v| v.matches(&pod.labels)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vpa_recommender_k8s_api::Labels;

    fn mk_pod(name: &str, labels: Vec<(&'static str, &'static str)>) -> PodState {
        PodState::new(PodId::new("ns-0", name), labels.into_iter().collect())
    }

    #[test]
    fn delete_untracked_is_an_error() {
        let mut state = ClusterState::new();
        let vpa_id = VpaId::new("ns-0", "vpa-0");
        let pod_id = PodId::new("ns-0", "pod-0");
        assert_eq!(
            state.delete_vpa(&vpa_id),
            Err(ClusterStateError::VpaNotFound(vpa_id.clone()))
        );
        assert_eq!(
            state.delete_pod(&pod_id),
            Err(ClusterStateError::PodNotFound(pod_id.clone()))
        );

        state.add_or_update_vpa(Vpa::new(vpa_id.clone(), None));
        state.add_or_update_pod(mk_pod("pod-0", vec![]));
        assert!(state.delete_vpa(&vpa_id).is_ok());
        assert!(state.delete_pod(&pod_id).is_ok());
        assert!(state.vpas().is_empty());
        assert!(state.pods().is_empty());
    }

    #[test]
    fn replace_reports_dropped_entries() {
        let mut state = ClusterState::new();
        state.add_or_update_pod(mk_pod("pod-0", vec![]));
        state.add_or_update_pod(mk_pod("pod-1", vec![]));

        let next = Some(mk_pod("pod-1", vec![("app", "web")]))
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();
        let removed = state.replace_pods(next);

        assert_eq!(removed, vec![PodId::new("ns-0", "pod-0")]);
        assert_eq!(state.pods().len(), 1);
        let pod = state.pod(&PodId::new("ns-0", "pod-1")).unwrap();
        assert_eq!(pod.labels, Labels::from_iter(Some(("app", "web"))));
    }

    #[test]
    fn membership_is_derived_from_selectors() {
        let mut state = ClusterState::new();
        let web = VpaId::new("ns-0", "web");
        let none = VpaId::new("ns-0", "none");
        state.add_or_update_vpa(Vpa::new(web.clone(), Some("app=web".parse().unwrap())));
        state.add_or_update_vpa(Vpa::new(none.clone(), None));
        state.add_or_update_pod(mk_pod("web-0", vec![("app", "web")]));
        state.add_or_update_pod(mk_pod("db-0", vec![("app", "db")]));

        let selected = state
            .pods_selected_by(&web)
            .map(|p| p.id.pod_name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(selected, vec!["web-0"]);
        assert_eq!(state.pods_selected_by(&none).count(), 0);

        let selecting = state
            .vpas_selecting(&PodId::new("ns-0", "web-0"))
            .map(|v| v.id.clone())
            .collect::<Vec<_>>();
        assert_eq!(selecting, vec![web.clone()]);

        // Removing the VPA leaves the pod in place.
        state.delete_vpa(&web).unwrap();
        assert_eq!(
            state
                .vpas_selecting(&PodId::new("ns-0", "web-0"))
                .count(),
            0
        );
        assert!(state.pod(&PodId::new("ns-0", "web-0")).is_some());
    }
}
