use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

struct Metrics {
    registry: Registry,
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    login_attempts_total: IntCounterVec,
    registrations_total: IntCounterVec,
    authorization_decisions_total: IntCounterVec,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

fn counter(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
) -> Result<IntCounterVec, prometheus::Error> {
    let metric = IntCounterVec::new(Opts::new(name, help), labels)?;
    registry.register(Box::new(metric.clone()))?;
    Ok(metric)
}

/// Build and register every collector. Calling it again is a no-op.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    if METRICS.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let http_requests_total = counter(
        &registry,
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"],
    )?;

    let http_request_duration_seconds = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
        ),
        &["method", "path", "status"],
    )?;
    registry.register(Box::new(http_request_duration_seconds.clone()))?;

    let login_attempts_total = counter(
        &registry,
        "login_attempts_total",
        "Login attempts by outcome",
        &["outcome"],
    )?;

    let registrations_total = counter(
        &registry,
        "registrations_total",
        "Registration attempts by outcome",
        &["outcome"],
    )?;

    let authorization_decisions_total = counter(
        &registry,
        "authorization_decisions_total",
        "Permission decisions by result",
        &["decision"],
    )?;

    // A concurrent initializer may have won; its collectors are equivalent.
    let _ = METRICS.set(Metrics {
        registry,
        http_requests_total,
        http_request_duration_seconds,
        login_attempts_total,
        registrations_total,
        authorization_decisions_total,
    });

    Ok(())
}

pub fn record_http_request(method: &str, path: &str, status: &str, seconds: f64) {
    if let Some(metrics) = METRICS.get() {
        metrics
            .http_requests_total
            .with_label_values(&[method, path, status])
            .inc();
        metrics
            .http_request_duration_seconds
            .with_label_values(&[method, path, status])
            .observe(seconds);
    }
}

pub fn record_login_attempt(outcome: &str) {
    if let Some(metrics) = METRICS.get() {
        metrics.login_attempts_total.with_label_values(&[outcome]).inc();
    }
}

pub fn record_registration(outcome: &str) {
    if let Some(metrics) = METRICS.get() {
        metrics.registrations_total.with_label_values(&[outcome]).inc();
    }
}

pub fn record_authorization_decision(decision: &str) {
    if let Some(metrics) = METRICS.get() {
        metrics
            .authorization_decisions_total
            .with_label_values(&[decision])
            .inc();
    }
}

pub fn get_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    let registry = match METRICS.get() {
        Some(m) => &m.registry,
        None => {
            tracing::error!("Metrics registry not initialized");
            return "# Metrics registry not initialized\n".to_string();
        }
    };

    let metric_families = registry.gather();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return format!("# Failed to encode metrics: {}\n", e);
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to convert metrics to UTF-8: {}", e);
            format!("# Failed to convert metrics to UTF-8: {}\n", e)
        }
    }
}
