//! Service metrics with Prometheus text exposition.
//!
//! Counters are kept in locked maps and rendered on demand in the
//! Prometheus text format. Cardinality is tiny (engines x verdicts plus a
//! handful of routes), so a sorted map behind a lock is plenty.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;

use crate::core::{EngineKind, Verdict};

#[derive(Debug, Default, Clone, Copy)]
struct DurationStats {
    sum_seconds: f64,
    count: u64,
}

/// Collects scan and HTTP request counters.
#[derive(Debug, Default)]
pub struct Metrics {
    scans_total: RwLock<BTreeMap<(String, String), u64>>,
    http_requests_total: RwLock<BTreeMap<(String, String, u16), u64>>,
    http_request_duration: RwLock<BTreeMap<(String, String), DurationStats>>,
}

impl Metrics {
    /// Creates an empty metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one completed scan.
    pub fn record_scan(&self, engine: EngineKind, result: Verdict) {
        let key = (engine.as_str().to_string(), result.as_str().to_string());
        *self.scans_total.write().entry(key).or_insert(0) += 1;
    }

    /// Records one completed HTTP request.
    pub fn record_http(&self, method: &str, endpoint: &str, status: u16, duration: Duration) {
        let key = (method.to_string(), endpoint.to_string(), status);
        *self.http_requests_total.write().entry(key).or_insert(0) += 1;

        let key = (method.to_string(), endpoint.to_string());
        let mut durations = self.http_request_duration.write();
        let stats = durations.entry(key).or_default();
        stats.sum_seconds += duration.as_secs_f64();
        stats.count += 1;
    }

    /// Renders all counters in the Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push_str("# HELP av_scans_total Total scans by engine and result\n");
        out.push_str("# TYPE av_scans_total counter\n");
        for ((engine, result), count) in self.scans_total.read().iter() {
            let _ = writeln!(
                out,
                "av_scans_total{{engine=\"{engine}\",result=\"{result}\"}} {count}"
            );
        }

        out.push_str("# HELP av_http_requests_total Total HTTP requests\n");
        out.push_str("# TYPE av_http_requests_total counter\n");
        for ((method, endpoint, status), count) in self.http_requests_total.read().iter() {
            let _ = writeln!(
                out,
                "av_http_requests_total{{method=\"{method}\",endpoint=\"{endpoint}\",status_code=\"{status}\"}} {count}"
            );
        }

        out.push_str("# HELP av_http_request_duration_seconds HTTP request duration in seconds\n");
        out.push_str("# TYPE av_http_request_duration_seconds summary\n");
        for ((method, endpoint), stats) in self.http_request_duration.read().iter() {
            let _ = writeln!(
                out,
                "av_http_request_duration_seconds_sum{{method=\"{method}\",endpoint=\"{endpoint}\"}} {}",
                stats.sum_seconds
            );
            let _ = writeln!(
                out,
                "av_http_request_duration_seconds_count{{method=\"{method}\",endpoint=\"{endpoint}\"}} {}",
                stats.count
            );
        }

        out
    }
}
