use crate::{
    core::ClusterState,
    feeder::{
        ClusterStateFeeder, Config, FeederMetrics, KubeSpecClient, KubeVpaLister,
        LegacySelectorFetcher, TargetRefSelectorFetcher, DEFAULT_MAX_CONCURRENT_FETCHES,
    },
    k8s::DEFAULT_RECOMMENDER_NAME,
};
use anyhow::{bail, Result};
use clap::Parser;
use prometheus_client::registry::Registry;
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::{debug, info, info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(name = "recommender", about = "Computes resource recommendations for VPAs")]
pub struct Args {
    #[clap(
        long,
        default_value = "vpa_recommender=info,warn",
        env = "VPA_RECOMMENDER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Only tracks pods selected by some VPA.
    #[clap(long)]
    memory_saver: bool,

    /// Only VPAs that name this recommender are processed.
    #[clap(long, default_value = DEFAULT_RECOMMENDER_NAME)]
    recommender_name: String,

    /// Limits VPA listing to a single namespace. All namespaces are listed by
    /// default.
    #[clap(long)]
    vpa_object_namespace: Option<String>,

    #[clap(long, default_value = "60")]
    recommender_interval_secs: u64,

    /// Limits how many VPA selectors are fetched from the API server at once.
    #[clap(long, default_value_t = DEFAULT_MAX_CONCURRENT_FETCHES)]
    max_concurrent_fetches: usize,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            memory_saver,
            recommender_name,
            vpa_object_namespace,
            recommender_interval_secs,
            max_concurrent_fetches,
        } = self;

        if recommender_interval_secs == 0 {
            bail!("--recommender-interval-secs must be positive");
        }
        let interval = Duration::from_secs(recommender_interval_secs);
        if max_concurrent_fetches == 0 {
            bail!("--max-concurrent-fetches must be positive");
        }

        let mut prom = <Registry>::default();
        let metrics =
            FeederMetrics::register(prom.sub_registry_with_prefix("vpa_recommender_feeder"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        let client = runtime.client();
        let feeder = ClusterStateFeeder::new(
            ClusterState::shared(),
            Config {
                memory_saver,
                recommender_name,
                max_concurrent_fetches,
            },
            metrics,
            KubeVpaLister::new(client.clone(), vpa_object_namespace.as_deref()),
            KubeSpecClient::new(client.clone()),
            LegacySelectorFetcher::new(),
            TargetRefSelectorFetcher::new(client),
        );

        info!(
            ?interval,
            memory_saver,
            namespace = ?vpa_object_namespace,
            "Starting cluster state feeder"
        );
        tokio::spawn(
            feed(feeder, interval, runtime.shutdown_handle()).instrument(info_span!("feeder")),
        );

        // Block the main thread on the shutdown signal. Once it fires, wait for the feeder to
        // finish its current pass before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}

/// Runs a load pass every `interval` until shutdown is signaled.
async fn feed(feeder: ClusterStateFeeder, interval: Duration, drain: drain::Watch) {
    let mut ticks = time::interval(interval);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = drain.signaled();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = ticks.tick() => {
                feeder.run_once().await;
                let state = feeder.cluster_state().read();
                debug!(vpas = state.vpas().len(), pods = state.pods().len(), "Pass complete");
            }
            _release = &mut shutdown => {
                info!("Shutting down");
                return;
            }
        }
    }
}
