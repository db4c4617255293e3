//! Wallet engine metrics.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;

/// Counters for discovery, invocation and upstream sessions.
pub struct McpMetrics {
    // Discovery metrics
    discoveries: AtomicU64,
    upstream_discovery_failures: AtomicU64,

    // Call metrics
    total_calls: AtomicU64,
    successful_calls: AtomicU64,
    failed_calls: AtomicU64,
    rejected_calls: AtomicU64,

    // Connection metrics
    connection_errors: AtomicU64,
    active_connections: AtomicU64,

    usage_failures: AtomicU64,

    // Per-upstream call latency, keyed by server name
    server_latencies: DashMap<String, LatencyStats>,
}

impl McpMetrics {
    pub fn new() -> Self {
        Self {
            discoveries: AtomicU64::new(0),
            upstream_discovery_failures: AtomicU64::new(0),
            total_calls: AtomicU64::new(0),
            successful_calls: AtomicU64::new(0),
            failed_calls: AtomicU64::new(0),
            rejected_calls: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            usage_failures: AtomicU64::new(0),
            server_latencies: DashMap::new(),
        }
    }

    pub fn record_discovery(&self, failed_upstreams: u64) {
        self.discoveries.fetch_add(1, Ordering::Relaxed);
        self.upstream_discovery_failures
            .fetch_add(failed_upstreams, Ordering::Relaxed);
    }

    /// Record a call rejected before any upstream was contacted.
    pub fn record_call_rejected(&self) {
        self.rejected_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_call_start(&self) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_call_end(&self, server_name: &str, success: bool, duration_ms: u64) {
        if success {
            self.successful_calls.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_calls.fetch_add(1, Ordering::Relaxed);
        }

        self.server_latencies
            .entry(server_name.to_string())
            .or_insert_with(LatencyStats::new)
            .record(duration_ms);
    }

    pub fn record_connection_error(&self) {
        self.connection_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_usage_failure(&self) {
        self.usage_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut server_latencies: Vec<(String, LatencySnapshot)> = self
            .server_latencies
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().snapshot()))
            .collect();
        server_latencies.sort_by(|a, b| a.0.cmp(&b.0));

        MetricsSnapshot {
            discoveries: self.discoveries.load(Ordering::Relaxed),
            upstream_discovery_failures: self.upstream_discovery_failures.load(Ordering::Relaxed),
            total_calls: self.total_calls.load(Ordering::Relaxed),
            successful_calls: self.successful_calls.load(Ordering::Relaxed),
            failed_calls: self.failed_calls.load(Ordering::Relaxed),
            rejected_calls: self.rejected_calls.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            usage_failures: self.usage_failures.load(Ordering::Relaxed),
            server_latencies,
        }
    }

    /// Latency stats for calls routed to one upstream.
    pub fn server_latency(&self, server_name: &str) -> Option<LatencySnapshot> {
        self.server_latencies
            .get(server_name)
            .map(|stats| stats.snapshot())
    }
}

impl Default for McpMetrics {
    fn default() -> Self {
        Self::new()
    }
}

struct LatencyStats {
    count: AtomicU64,
    total_ms: AtomicU64,
    min_ms: AtomicU64,
    max_ms: AtomicU64,
}

impl LatencyStats {
    fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
            total_ms: AtomicU64::new(0),
            min_ms: AtomicU64::new(u64::MAX),
            max_ms: AtomicU64::new(0),
        }
    }

    fn record(&self, ms: u64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.total_ms.fetch_add(ms, Ordering::Relaxed);
        self.min_ms.fetch_min(ms, Ordering::Relaxed);
        self.max_ms.fetch_max(ms, Ordering::Relaxed);
    }

    fn snapshot(&self) -> LatencySnapshot {
        let count = self.count.load(Ordering::Relaxed);
        let total = self.total_ms.load(Ordering::Relaxed);
        let min = self.min_ms.load(Ordering::Relaxed);
        let max = self.max_ms.load(Ordering::Relaxed);

        LatencySnapshot {
            count,
            avg_ms: if count > 0 { total / count } else { 0 },
            min_ms: if min == u64::MAX { 0 } else { min },
            max_ms: max,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub discoveries: u64,
    pub upstream_discovery_failures: u64,
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub rejected_calls: u64,
    pub connection_errors: u64,
    pub active_connections: u64,
    pub usage_failures: u64,
    pub server_latencies: Vec<(String, LatencySnapshot)>,
}

impl MetricsSnapshot {
    /// Calculate success rate as a percentage.
    pub fn success_rate(&self) -> f64 {
        let completed = self.successful_calls + self.failed_calls;
        if completed == 0 {
            100.0
        } else {
            (self.successful_calls as f64 / completed as f64) * 100.0
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencySnapshot {
    pub count: u64,
    pub avg_ms: u64,
    pub min_ms: u64,
    pub max_ms: u64,
}
