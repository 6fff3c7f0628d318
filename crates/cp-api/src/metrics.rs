//! Engine counters, exposed in prometheus text format at `/metrics`.

use std::sync::Mutex;

use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::registry::Registry;

pub struct Metrics {
    registry: Mutex<Registry>,
    pub votes_cast: Counter,
    pub flags_created: Counter,
    pub reviews_committed: Counter,
    pub anomaly_scans: Counter,
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let votes_cast = Counter::default();
        let flags_created = Counter::default();
        let reviews_committed = Counter::default();
        let anomaly_scans = Counter::default();
        registry.register("votes_cast", "Vote requests handled", votes_cast.clone());
        registry.register("flags_created", "Abuse flags filed", flags_created.clone());
        registry.register(
            "reviews_committed",
            "Moderation reviews committed",
            reviews_committed.clone(),
        );
        registry.register("anomaly_scans", "Anomaly scans served", anomaly_scans.clone());
        Self {
            registry: Mutex::new(registry),
            votes_cast,
            flags_created,
            reviews_committed,
            anomaly_scans,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Ok(registry) = self.registry.lock() {
            let _ = encode(&mut out, &registry);
        }
        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
