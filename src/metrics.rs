//! Service counters and their Prometheus exposition, served on a
//! dedicated port.

use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::routing::get;
use axum::Router;

/// Increment-only atomic counter.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Fixed-bucket latency histogram; boundaries in milliseconds.
#[derive(Debug)]
pub struct Histogram {
    bounds_ms: Vec<u64>,
    counts: Vec<AtomicU64>,
    sum_micros: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    pub fn new_latency() -> Self {
        let bounds_ms = vec![5, 10, 25, 50, 100, 250, 500, 1000, 2500, 5000, 10000];
        let counts = bounds_ms.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            bounds_ms,
            counts,
            sum_micros: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    pub fn observe(&self, duration: Duration) {
        let micros = duration.as_micros() as u64;
        self.sum_micros.fetch_add(micros, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        for (i, &bound) in self.bounds_ms.iter().enumerate() {
            if micros <= bound * 1000 {
                self.counts[i].fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        // beyond the last bound: captured by +Inf only
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new_latency()
    }
}

/// Every counter the service exposes. Names follow the augmentation
/// service family so dashboards can be shared across implementations.
#[derive(Debug, Default)]
pub struct ServiceMetrics {
    pub requests_total: Counter,
    pub invalid_requests_total: Counter,
    pub errors_logged_total: Counter,
    pub processed_successful: Counter,
    pub processed_unsuccessful: Counter,
    pub cache_hits: Counter,
    pub cache_misses: Counter,
    pub request_duration_ms: Counter,
    pub request_duration: Histogram,
}

impl ServiceMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Render every metric in Prometheus exposition format.
    pub fn to_prometheus(&self) -> String {
        let mut out = String::with_capacity(2048);

        write_counter(
            &mut out,
            "augmentation_requests_total",
            "The total number of requests received.",
            self.requests_total.get(),
        );
        write_counter(
            &mut out,
            "augmentation_invalid_requests_total",
            "The total number of invalid requests received.",
            self.invalid_requests_total.get(),
        );
        write_counter(
            &mut out,
            "augmentation_errors_logged_total",
            "The total number of errors logged.",
            self.errors_logged_total.get(),
        );
        write_counter_pair(
            &mut out,
            "augmentation_objects_processed_total",
            "The total number of objects processed.",
            ("status", "successful", self.processed_successful.get()),
            ("status", "unsuccessful", self.processed_unsuccessful.get()),
        );
        write_counter_pair(
            &mut out,
            "augmentation_objects_cache_hits",
            "Number of requests served from the cache.",
            ("cache", "hit", self.cache_hits.get()),
            ("cache", "miss", self.cache_misses.get()),
        );
        write_counter(
            &mut out,
            "augmentation_request_duration_milliseconds",
            "The total amount of time spent processing requests.",
            self.request_duration_ms.get(),
        );
        write_histogram(
            &mut out,
            "augmentation_request_duration_hist",
            "Histogram of time spent processing requests.",
            &self.request_duration,
        );

        out
    }
}

fn write_counter(out: &mut String, name: &str, help: &str, value: u64) {
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} counter", name);
    let _ = writeln!(out, "{} {}", name, value);
}

fn write_counter_pair(
    out: &mut String,
    name: &str,
    help: &str,
    first: (&str, &str, u64),
    second: (&str, &str, u64),
) {
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} counter", name);
    let _ = writeln!(out, "{}{{{}=\"{}\"}} {}", name, first.0, first.1, first.2);
    let _ = writeln!(out, "{}{{{}=\"{}\"}} {}", name, second.0, second.1, second.2);
}

fn write_histogram(out: &mut String, name: &str, help: &str, hist: &Histogram) {
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} histogram", name);

    let mut cumulative = 0u64;
    for (i, bound) in hist.bounds_ms.iter().enumerate() {
        cumulative += hist.counts[i].load(Ordering::Relaxed);
        let le_seconds = *bound as f64 / 1000.0;
        let _ = writeln!(out, "{}_bucket{{le=\"{:.3}\"}} {}", name, le_seconds, cumulative);
    }
    let total = hist.count();
    let _ = writeln!(out, "{}_bucket{{le=\"+Inf\"}} {}", name, total);
    let sum_seconds = hist.sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0;
    let _ = writeln!(out, "{}_sum {:.6}", name, sum_seconds);
    let _ = writeln!(out, "{}_count {}", name, total);
}

/// Router for the metrics listener.
pub fn router(metrics: Arc<ServiceMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(scrape))
        .with_state(metrics)
}

async fn scrape(State(metrics): State<Arc<ServiceMetrics>>) -> String {
    metrics.to_prometheus()
}
