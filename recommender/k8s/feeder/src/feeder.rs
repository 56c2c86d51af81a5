use crate::{
    client::{SpecClient, VpaLister},
    fetcher::SelectorFetcher,
    metrics::{FeederMetrics, Pass},
    resolve::{resolve, Fetched, Resolution},
    Config,
};
use anyhow::Result;
use futures::prelude::*;
use tracing::{debug, info, instrument, warn};
use vpa_recommender_core::{ConditionKind, HashMap, SharedClusterState, Vpa, VpaId};
use vpa_recommender_k8s_api::{ResourceExt, VerticalPodAutoscaler};

/// Loads VPAs and pods from the cluster into a shared `ClusterState`.
///
/// Each load pass replaces the state's VPAs or pods wholesale. Passes are
/// expected to run sequentially from a single control loop; concurrent
/// readers observe either the prior pass or the new one.
pub struct ClusterStateFeeder {
    cluster_state: SharedClusterState,
    config: Config,
    metrics: FeederMetrics,
    vpa_lister: Box<dyn VpaLister>,
    spec_client: Box<dyn SpecClient>,
    legacy_selector_fetcher: Box<dyn SelectorFetcher>,
    selector_fetcher: Box<dyn SelectorFetcher>,
}

/// A VPA resolved during a load pass.
struct Observed {
    vpa: Vpa,
    uses_legacy_selector: bool,
}

// === impl ClusterStateFeeder ===

impl ClusterStateFeeder {
    pub fn new(
        cluster_state: SharedClusterState,
        config: Config,
        metrics: FeederMetrics,
        vpa_lister: impl VpaLister + 'static,
        spec_client: impl SpecClient + 'static,
        legacy_selector_fetcher: impl SelectorFetcher + 'static,
        selector_fetcher: impl SelectorFetcher + 'static,
    ) -> Self {
        Self {
            cluster_state,
            config,
            metrics,
            vpa_lister: Box::new(vpa_lister),
            spec_client: Box::new(spec_client),
            legacy_selector_fetcher: Box::new(legacy_selector_fetcher),
            selector_fetcher: Box::new(selector_fetcher),
        }
    }

    pub fn cluster_state(&self) -> &SharedClusterState {
        &self.cluster_state
    }

    /// Loads VPAs and then pods, logging failures so that the next pass may retry.
    pub async fn run_once(&self) {
        if let Err(error) = self.load_vpas().await {
            warn!(%error, "Failed to load VPAs");
        }
        if let Err(error) = self.load_pods().await {
            warn!(%error, "Failed to load pods");
        }
    }

    /// Replaces the tracked VPAs with those currently listed in the cluster.
    ///
    /// Each VPA's selector and conditions are recomputed from scratch. Selector
    /// fetch failures are recorded as conditions on the affected VPA; only a
    /// listing failure fails the pass, leaving the cluster state untouched.
    #[instrument(skip(self))]
    pub async fn load_vpas(&self) -> Result<()> {
        let objects = match self.vpa_lister.list().await {
            Ok(objects) => objects,
            Err(error) => {
                self.metrics.pass(Pass::Vpas, false);
                return Err(error);
            }
        };

        let observed = stream::iter(
            objects
                .iter()
                .filter(|obj| self.is_responsible_for(obj))
                .map(|obj| self.observe_vpa(obj)),
        )
        .boxed()
        .buffer_unordered(self.config.max_concurrent_fetches.max(1))
        .collect::<Vec<_>>()
        .await;

        let mut legacy = 0;
        let mut unsupported = 0;
        let mut vpas = HashMap::with_capacity(observed.len());
        for Observed {
            vpa,
            uses_legacy_selector,
        } in observed.into_iter().flatten()
        {
            if uses_legacy_selector {
                legacy += 1;
            }
            if vpa.conditions.contains(ConditionKind::ConfigUnsupported) {
                unsupported += 1;
            }
            vpas.insert(vpa.id.clone(), vpa);
        }
        let tracked = vpas.len();

        let removed = self.cluster_state.write().replace_vpas(vpas);
        for id in removed {
            debug!(vpa = %id, "Removed VPA");
        }

        debug!(tracked, legacy, unsupported, "Loaded VPAs");
        self.metrics.vpas_loaded(tracked, legacy, unsupported);
        Ok(())
    }

    /// Replaces the tracked pods with those currently listed in the cluster.
    ///
    /// In memory-saver mode, only pods selected by at least one tracked VPA are
    /// retained. Otherwise every listed pod is retained.
    #[instrument(skip(self))]
    pub async fn load_pods(&self) -> Result<()> {
        let specs = match self.spec_client.get_pod_specs().await {
            Ok(specs) => specs,
            Err(error) => {
                self.metrics.pass(Pass::Pods, false);
                return Err(error);
            }
        };
        let listed = specs.len();

        let (tracked, removed) = {
            let mut state = self.cluster_state.write();
            let pods = specs
                .into_iter()
                .filter(|spec| {
                    !self.config.memory_saver
                        || state.vpas().values().any(|vpa| vpa.matches(&spec.labels))
                })
                .map(|spec| (spec.id.clone(), spec.into_pod_state()))
                .collect::<HashMap<_, _>>();
            let tracked = pods.len();
            (tracked, state.replace_pods(pods))
        };

        for id in &removed {
            debug!(pod = %id, "Removed pod");
        }

        debug!(
            listed,
            tracked,
            removed = removed.len(),
            memory_saver = self.config.memory_saver,
            "Loaded pods"
        );
        self.metrics.pods_loaded(tracked);
        Ok(())
    }

    fn is_responsible_for(&self, obj: &VerticalPodAutoscaler) -> bool {
        let responsible = obj.spec.selects_recommender(&self.config.recommender_name);
        if !responsible {
            debug!(
                ns = ?obj.metadata.namespace,
                name = %obj.name_any(),
                recommender = %self.config.recommender_name,
                "Ignoring VPA assigned to other recommenders"
            );
        }
        responsible
    }

    async fn observe_vpa(&self, obj: &VerticalPodAutoscaler) -> Option<Observed> {
        let Some(namespace) = obj.namespace() else {
            warn!(name = %obj.name_any(), "Ignoring VPA without a namespace");
            return None;
        };
        let id = VpaId::new(namespace, obj.name_any());

        // The legacy fetcher is probed on its own so that objects still
        // carrying a legacy selector are reported regardless of how the
        // resolution below treats them.
        let uses_legacy_selector =
            Fetched::from(self.legacy_selector_fetcher.fetch(obj).await).is_present();
        if uses_legacy_selector {
            debug!(vpa = %id, "VPA sets a legacy label selector");
        }

        let Resolution {
            selector,
            conditions,
        } = self.resolve_selector(&id, obj).await;

        let mut vpa = Vpa::new(id, Some(selector));
        for (kind, message) in conditions.iter() {
            vpa.set_condition(kind, message);
        }
        vpa.update_mode = obj.spec.update_mode();
        vpa.annotations = obj.annotations().clone();
        Some(Observed {
            vpa,
            uses_legacy_selector,
        })
    }

    async fn resolve_selector(&self, id: &VpaId, obj: &VerticalPodAutoscaler) -> Resolution {
        let legacy = Fetched::from(self.legacy_selector_fetcher.fetch(obj).await);
        if let Fetched::Failed(error) = &legacy {
            debug!(vpa = %id, %error, "Failed to fetch legacy selector");
        }
        let current = Fetched::from(self.selector_fetcher.fetch(obj).await);

        let res = resolve(&legacy, current);
        match res.unsupported_reason() {
            Some(reason) => info!(vpa = %id, %reason, "Unsupported VPA configuration"),
            None => debug!(vpa = %id, selector = %res.selector, "Resolved selector"),
        }
        res
    }
}
