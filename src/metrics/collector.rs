// src/metrics/collector.rs
use crate::health::Status;
use anyhow::Result;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    pub fn gather(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(buffer)
    }
}

pub struct MetricsCollector {
    // Per-check metrics
    pub check_duration_seconds: HistogramVec,
    pub checks_total: IntCounterVec,

    // Aggregate readiness, 1 = ok, 0 = error
    pub ready_status: IntGauge,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        let check_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "vital_check_duration_seconds",
                "Health check duration in seconds",
            ),
            &["check"],
        )?;
        registry.register(Box::new(check_duration_seconds.clone()))?;

        let checks_total = IntCounterVec::new(
            Opts::new("vital_checks_total", "Total health check executions"),
            &["check", "status"],
        )?;
        registry.register(Box::new(checks_total.clone()))?;

        let ready_status = IntGauge::new(
            "vital_ready_status",
            "Last readiness result (1=ok, 0=error)",
        )?;
        registry.register(Box::new(ready_status.clone()))?;

        Ok(Self {
            check_duration_seconds,
            checks_total,
            ready_status,
        })
    }

    pub fn record_check(&self, check: &str, status: Status, duration: Duration) {
        self.checks_total
            .with_label_values(&[check, status.as_str()])
            .inc();

        self.check_duration_seconds
            .with_label_values(&[check])
            .observe(duration.as_secs_f64());
    }

    pub fn update_ready_status(&self, status: Status) {
        let value = if status.is_ok() { 1 } else { 0 };
        self.ready_status.set(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_exposes_check_metrics() {
        let registry = MetricsRegistry::new().unwrap();
        let collector = registry.collector();

        collector.record_check("db", Status::Ok, Duration::from_millis(20));
        collector.record_check("db", Status::Error, Duration::from_millis(5));
        collector.update_ready_status(Status::Error);

        let text = String::from_utf8(registry.gather().unwrap()).unwrap();
        assert!(text.contains(r#"vital_checks_total{check="db",status="ok"} 1"#));
        assert!(text.contains(r#"vital_checks_total{check="db",status="error"} 1"#));
        assert!(text.contains("vital_ready_status 0"));
        assert!(text.contains("vital_check_duration_seconds_count{check=\"db\"} 2"));
    }
}
