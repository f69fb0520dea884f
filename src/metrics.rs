//! Service metrics: recommendation latency and outcome counters.

use std::time::Duration;

use serde::Serialize;

/// Most recent latencies kept for percentile estimates.
const LATENCY_WINDOW: usize = 10_000;

/// Collects runtime metrics for the recommendation service.
#[derive(Debug)]
pub struct MetricsCollector {
    query_latencies_us: Vec<f64>,
    next_slot: usize,
    total_queries: u64,
    not_found: u64,
    bad_requests: u64,
    reloads: u64,
}

/// Point-in-time view served by `GET /metrics`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MetricsSnapshot {
    pub total_queries: u64,
    pub not_found: u64,
    pub bad_requests: u64,
    pub reloads: u64,
    pub avg_query_latency_us: f64,
    pub p50_query_latency_us: f64,
    pub p95_query_latency_us: f64,
    pub p99_query_latency_us: f64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            query_latencies_us: Vec::new(),
            next_slot: 0,
            total_queries: 0,
            not_found: 0,
            bad_requests: 0,
            reloads: 0,
        }
    }

    /// Record a served query with its duration.
    pub fn record_query(&mut self, duration: Duration) {
        self.total_queries += 1;
        let micros = duration.as_micros() as f64;
        if self.query_latencies_us.len() < LATENCY_WINDOW {
            self.query_latencies_us.push(micros);
        } else {
            self.query_latencies_us[self.next_slot] = micros;
            self.next_slot = (self.next_slot + 1) % LATENCY_WINDOW;
        }
    }

    pub fn record_not_found(&mut self) {
        self.not_found += 1;
    }

    pub fn record_bad_request(&mut self) {
        self.bad_requests += 1;
    }

    pub fn record_reload(&mut self) {
        self.reloads += 1;
    }

    pub fn total_queries(&self) -> u64 {
        self.total_queries
    }

    /// Average query latency in microseconds.
    pub fn avg_query_latency_us(&self) -> f64 {
        if self.query_latencies_us.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.query_latencies_us.iter().sum();
        sum / self.query_latencies_us.len() as f64
    }

    /// Get a percentile of query latency (e.g., 50.0, 95.0, 99.0).
    pub fn percentile_query_latency_us(&self, percentile: f64) -> f64 {
        if self.query_latencies_us.is_empty() {
            return 0.0;
        }

        let mut sorted = self.query_latencies_us.clone();
        sorted.sort_by(f64::total_cmp);

        let index = ((percentile / 100.0) * (sorted.len() - 1) as f64).round() as usize;
        sorted[index.min(sorted.len() - 1)]
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_queries: self.total_queries,
            not_found: self.not_found,
            bad_requests: self.bad_requests,
            reloads: self.reloads,
            avg_query_latency_us: self.avg_query_latency_us(),
            p50_query_latency_us: self.percentile_query_latency_us(50.0),
            p95_query_latency_us: self.percentile_query_latency_us(95.0),
            p99_query_latency_us: self.percentile_query_latency_us(99.0),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
