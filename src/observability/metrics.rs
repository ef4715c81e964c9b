use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub operations_total: IntCounterVec,
    pub operation_latency_seconds: HistogramVec,
    pub auto_closed_total: IntCounter,
    pub audit_events_dropped_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let operations_total = IntCounterVec::new(
            Opts::new(
                "assignment_operations_total",
                "Assignment lifecycle operations by action and outcome",
            ),
            &["action", "outcome"],
        )
        .expect("valid assignment_operations_total metric");

        let operation_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "assignment_operation_latency_seconds",
                "Latency of assignment lifecycle operations in seconds",
            ),
            &["action"],
        )
        .expect("valid assignment_operation_latency_seconds metric");

        let auto_closed_total = IntCounter::new(
            "assignment_auto_closed_total",
            "Primary assignments ended because a newer primary superseded them",
        )
        .expect("valid assignment_auto_closed_total metric");

        let audit_events_dropped_total = IntCounter::new(
            "audit_events_dropped_total",
            "Audit events the sink failed to record",
        )
        .expect("valid audit_events_dropped_total metric");

        registry
            .register(Box::new(operations_total.clone()))
            .expect("register assignment_operations_total");
        registry
            .register(Box::new(operation_latency_seconds.clone()))
            .expect("register assignment_operation_latency_seconds");
        registry
            .register(Box::new(auto_closed_total.clone()))
            .expect("register assignment_auto_closed_total");
        registry
            .register(Box::new(audit_events_dropped_total.clone()))
            .expect("register audit_events_dropped_total");

        Self {
            registry,
            operations_total,
            operation_latency_seconds,
            auto_closed_total,
            audit_events_dropped_total,
        }
    }

    pub fn observe_operation(&self, action: &str, success: bool, elapsed_secs: f64) {
        let outcome = if success { "success" } else { "error" };
        self.operations_total
            .with_label_values(&[action, outcome])
            .inc();
        self.operation_latency_seconds
            .with_label_values(&[action])
            .observe(elapsed_secs);
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
