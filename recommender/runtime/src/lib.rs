#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use vpa_recommender_core as core;
pub use vpa_recommender_k8s_api as k8s;
pub use vpa_recommender_k8s_feeder as feeder;

mod args;

pub use self::args::Args;
