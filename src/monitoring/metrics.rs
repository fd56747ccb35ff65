use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;
use serde::Serialize;
use tracing::info;

/// Global metrics registry used across the chatbot.
pub static METRICS: Lazy<Metrics> = Lazy::new(Metrics::default);

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs()
}

#[derive(Default)]
struct MetricsInner {
    turns_started: AtomicU64,
    turns_answered: AtomicU64,
    turns_failed: AtomicU64,
    statements_rejected: AtomicU64,
    last_event_ts: AtomicU64,
}

/// Lightweight metrics handle backed by atomics so it can be cloned cheaply.
#[derive(Clone, Default)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

impl Metrics {
    fn touch(&self) {
        self.inner
            .last_event_ts
            .store(now_unix_secs(), Ordering::Relaxed);
    }

    pub fn record_turn_started(&self) {
        self.inner.turns_started.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    pub fn record_turn_answered(&self, rows: usize) {
        self.inner.turns_answered.fetch_add(1, Ordering::Relaxed);
        self.touch();

        info!(
            target: "metrics",
            event = "turn_answered",
            rows,
            total_answered = self.inner.turns_answered.load(Ordering::Relaxed),
            "turn answered"
        );
    }

    pub fn record_turn_failed(&self, kind: &str) {
        self.inner.turns_failed.fetch_add(1, Ordering::Relaxed);
        self.touch();

        info!(
            target: "metrics",
            event = "turn_failed",
            kind = %kind,
            total_failures = self.inner.turns_failed.load(Ordering::Relaxed),
            "turn failed"
        );
    }

    pub fn record_statement_rejected(&self) {
        self.inner.statements_rejected.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            turns_started: self.inner.turns_started.load(Ordering::Relaxed),
            turns_answered: self.inner.turns_answered.load(Ordering::Relaxed),
            turns_failed: self.inner.turns_failed.load(Ordering::Relaxed),
            statements_rejected: self.inner.statements_rejected.load(Ordering::Relaxed),
            last_event_ts: self.inner.last_event_ts.load(Ordering::Relaxed),
        }
    }
}

/// Serializable view of current metrics used by the health endpoint and the
/// periodic metrics log.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub turns_started: u64,
    pub turns_answered: u64,
    pub turns_failed: u64,
    pub statements_rejected: u64,
    pub last_event_ts: u64,
}

pub fn log_metrics_snapshot(snapshot: &MetricsSnapshot) {
    info!(
        target: "metrics",
        event = "metrics_snapshot",
        turns_started = snapshot.turns_started,
        turns_answered = snapshot.turns_answered,
        turns_failed = snapshot.turns_failed,
        statements_rejected = snapshot.statements_rejected,
        last_event_ts = snapshot.last_event_ts,
        "metrics snapshot"
    );
}
