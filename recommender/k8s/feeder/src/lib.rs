//! VPA Recommender Cluster-State Feeder
//!
//! The feeder keeps the recommender's `ClusterState` in sync with the cluster. Each pass lists
//! objects through a capability trait and replaces the corresponding half of the state:
//!
//! - `load_vpas` lists `VerticalPodAutoscaler` objects. Each object's pod selector is resolved
//!   from two sources: the legacy label selector set on the object itself and the selector of the
//!   controller its `targetRef` points at. Only the `targetRef` selector ever takes effect; any
//!   other combination selects no pods and sets a `ConfigUnsupported` condition on the VPA.
//! - `load_pods` lists pods and keeps those selected by some VPA. When memory-saver mode is
//!   disabled, every listed pod is kept.
//!
//! ```text
//! [ VpaLister ] --> resolve(legacy, targetRef) --> [ Vpa ]
//! [ SpecClient ] --> matches(Vpa selectors) -----> [ PodState ]
//! ```
//!
//! Listing failures abort a pass and leave the state as it was. Selector fetch failures only
//! affect the VPA being resolved.

#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

use vpa_recommender_k8s_api::DEFAULT_RECOMMENDER_NAME;

mod client;
mod feeder;
mod fetcher;
mod metrics;
mod resolve;


pub use self::{
    client::{BasicPodSpec, KubeSpecClient, KubeVpaLister, SpecClient, VpaLister},
    feeder::ClusterStateFeeder,
    fetcher::{FetchError, LegacySelectorFetcher, SelectorFetcher, TargetRefSelectorFetcher},
    metrics::FeederMetrics,
    resolve::{
        resolve, Fetched, Resolution, BOTH_SELECTORS_DEFINED, CANNOT_READ_TARGET_REF,
        LEGACY_SELECTOR_UNSUPPORTED,
    },
};

/// The default bound on selector fetches in flight during a VPA pass.
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 16;

/// Configures a `ClusterStateFeeder`.
#[derive(Clone, Debug)]
pub struct Config {
    /// Retain only the pods selected by some VPA.
    pub memory_saver: bool,

    /// Only VPAs that name this recommender are tracked. VPAs that name no
    /// recommender belong to the default one.
    pub recommender_name: String,

    /// Limits how many VPAs have their selectors fetched concurrently. Each
    /// fetch may issue a request to the API server.
    pub max_concurrent_fetches: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            memory_saver: false,
            recommender_name: DEFAULT_RECOMMENDER_NAME.to_string(),
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
        }
    }
}
