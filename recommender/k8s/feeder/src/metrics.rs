use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, gauge::Gauge},
    registry::Registry,
};

#[derive(Clone, Debug, Default)]
pub struct FeederMetrics {
    vpas: Gauge,
    pods: Gauge,
    legacy_selector_vpas: Gauge,
    unsupported_config_vpas: Gauge,
    passes: Family<PassLabels, Counter>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct PassLabels {
    kind: &'static str,
    result: &'static str,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Pass {
    Vpas,
    Pods,
}

impl FeederMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let vpas = Gauge::default();
        prom.register("vpas", "Number of tracked VPAs", vpas.clone());

        let pods = Gauge::default();
        prom.register("pods", "Number of tracked pods", pods.clone());

        let legacy_selector_vpas = Gauge::default();
        prom.register(
            "legacy_selector_vpas",
            "Number of VPAs that still set a legacy label selector",
            legacy_selector_vpas.clone(),
        );

        let unsupported_config_vpas = Gauge::default();
        prom.register(
            "unsupported_config_vpas",
            "Number of VPAs whose selector configuration is unsupported",
            unsupported_config_vpas.clone(),
        );

        let passes = Family::default();
        prom.register(
            "passes",
            "Count of load passes by kind and result",
            passes.clone(),
        );

        Self {
            vpas,
            pods,
            legacy_selector_vpas,
            unsupported_config_vpas,
            passes,
        }
    }

    pub(crate) fn vpas_loaded(&self, tracked: usize, legacy: usize, unsupported: usize) {
        self.vpas.set(tracked as i64);
        self.legacy_selector_vpas.set(legacy as i64);
        self.unsupported_config_vpas.set(unsupported as i64);
        self.pass(Pass::Vpas, true);
    }

    pub(crate) fn pods_loaded(&self, tracked: usize) {
        self.pods.set(tracked as i64);
        self.pass(Pass::Pods, true);
    }

    pub(crate) fn pass(&self, pass: Pass, ok: bool) {
        self.passes.get_or_create(&PassLabels::new(pass, ok)).inc();
    }

    #[cfg(test)]
    pub(crate) fn passes(&self, pass: Pass, ok: bool) -> u64 {
        self.passes.get_or_create(&PassLabels::new(pass, ok)).get()
    }

    #[cfg(test)]
    pub(crate) fn tracked(&self) -> (i64, i64, i64, i64) {
        (
            self.vpas.get(),
            self.pods.get(),
            self.legacy_selector_vpas.get(),
            self.unsupported_config_vpas.get(),
        )
    }
}

impl PassLabels {
    fn new(pass: Pass, ok: bool) -> Self {
        let kind = match pass {
            Pass::Vpas => "vpas",
            Pass::Pods => "pods",
        };
        let result = if ok { "ok" } else { "error" };
        Self { kind, result }
    }
}
