//! Prometheus metrics for the login coordinator.
//!
//! Tracks login attempts by mode and outcome, plus how long callers wait
//! for the process-wide lock and how long they hold it.

use prometheus::{Counter, CounterVec, Histogram, HistogramOpts, Opts, Registry, TextEncoder};

/// Login metrics collection.
pub struct LoginMetrics {
    /// The Prometheus registry.
    pub registry: Registry,

    /// Total login attempts by mode and outcome.
    pub attempts_total: CounterVec,

    /// Time spent waiting to enter the critical section.
    pub lock_wait_seconds: Histogram,

    /// Time spent inside the critical section, action included.
    pub lock_held_seconds: Histogram,

    /// Total registry SASL client configurations installed.
    pub registry_sasl_configured: Counter,
}

impl LoginMetrics {
    /// Create a new metrics collection.
    ///
    /// # Panics
    ///
    /// Panics if metric registration fails (should not happen with unique names).
    #[must_use]
    pub fn new() -> Self {
        let registry = Registry::new();

        let attempts_total = CounterVec::new(
            Opts::new(
                "cluster_login_attempts_total",
                "Total number of login attempts by mode and outcome",
            ),
            &["mode", "outcome"],
        )
        .expect("metric creation should succeed");

        let lock_wait_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "cluster_login_lock_wait_seconds",
                "Time spent waiting for the login serialization lock",
            )
            .buckets(vec![
                0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0,
            ]),
        )
        .expect("metric creation should succeed");

        let lock_held_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "cluster_login_lock_held_seconds",
                "Time spent holding the login serialization lock, action included",
            )
            .buckets(vec![
                0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0,
            ]),
        )
        .expect("metric creation should succeed");

        let registry_sasl_configured = Counter::new(
            "cluster_login_registry_sasl_configured_total",
            "Total number of registry SASL client configurations installed",
        )
        .expect("metric creation should succeed");

        registry
            .register(Box::new(attempts_total.clone()))
            .expect("metric registration should succeed");
        registry
            .register(Box::new(lock_wait_seconds.clone()))
            .expect("metric registration should succeed");
        registry
            .register(Box::new(lock_held_seconds.clone()))
            .expect("metric registration should succeed");
        registry
            .register(Box::new(registry_sasl_configured.clone()))
            .expect("metric registration should succeed");

        Self {
            registry,
            attempts_total,
            lock_wait_seconds,
            lock_held_seconds,
            registry_sasl_configured,
        }
    }

    /// Record one login attempt outcome.
    pub fn record_attempt(&self, mode: &str, outcome: &str) {
        self.attempts_total.with_label_values(&[mode, outcome]).inc();
    }

    /// Record time spent waiting for the lock.
    pub fn observe_lock_wait(&self, seconds: f64) {
        self.lock_wait_seconds.observe(seconds);
    }

    /// Record time spent holding the lock.
    pub fn observe_lock_held(&self, seconds: f64) {
        self.lock_held_seconds.observe(seconds);
    }

    /// Record a registry SASL configuration install.
    pub fn record_registry_sasl_configured(&self) {
        self.registry_sasl_configured.inc();
    }

    /// Encode metrics in Prometheus text format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = String::new();
        encoder.encode_utf8(&metric_families, &mut buffer)?;
        Ok(buffer)
    }
}

impl Default for LoginMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = LoginMetrics::new();
        assert!(metrics.encode().is_ok());
    }

    #[test]
    fn test_record_attempt() {
        let metrics = LoginMetrics::new();
        metrics.record_attempt("kerberos", "success");
        metrics.record_attempt("kerberos", "auth_error");
        metrics.record_attempt("remote_user", "success");

        let output = metrics.encode().unwrap();
        assert!(output.contains("cluster_login_attempts_total"));
        assert!(output.contains("auth_error"));
    }

    #[test]
    fn test_lock_histograms() {
        let metrics = LoginMetrics::new();
        metrics.observe_lock_wait(0.0002);
        metrics.observe_lock_held(0.004);

        let output = metrics.encode().unwrap();
        assert!(output.contains("cluster_login_lock_wait_seconds"));
        assert!(output.contains("cluster_login_lock_held_seconds"));
    }

    #[test]
    fn test_registry_sasl_counter() {
        let metrics = LoginMetrics::new();
        metrics.record_registry_sasl_configured();

        let output = metrics.encode().unwrap();
        assert!(output.contains("cluster_login_registry_sasl_configured_total"));
    }
}
