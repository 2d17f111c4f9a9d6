use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Lock-free audit pipeline counters.
#[derive(Debug, Default)]
pub struct AuditMetrics {
    persisted: AtomicU64,
    duplicates: AtomicU64,
    persist_failures: AtomicU64,
    fallback_writes: AtomicU64,
    fallback_failures: AtomicU64,
    fanout_failures: AtomicU64,
    chain_conflicts: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time copy of [`AuditMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditMetricsSnapshot {
    /// Events appended to the primary store.
    pub persisted: u64,
    /// Appends skipped because the audit id already existed.
    pub duplicates: u64,
    /// Events the primary store could not persist.
    pub persist_failures: u64,
    /// Events written to the fallback sink.
    pub fallback_writes: u64,
    /// Events lost because the fallback sink failed as well.
    pub fallback_failures: u64,
    /// Failed external sink deliveries.
    pub fanout_failures: u64,
    /// Appends that lost a race for a chain position.
    pub chain_conflicts: u64,
    /// Events emitted after the writer stopped.
    pub dropped: u64,
}

impl AuditMetrics {
    pub(super) fn record_persisted(&self) {
        self.persisted.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn record_persist_failure(&self) {
        self.persist_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn record_fallback_write(&self) {
        self.fallback_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn record_fallback_failure(&self) {
        self.fallback_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn record_fanout_failure(&self) {
        self.fanout_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn record_chain_conflict(&self) {
        self.chain_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads every counter.
    #[must_use]
    pub fn snapshot(&self) -> AuditMetricsSnapshot {
        AuditMetricsSnapshot {
            persisted: self.persisted.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            fallback_writes: self.fallback_writes.load(Ordering::Relaxed),
            fallback_failures: self.fallback_failures.load(Ordering::Relaxed),
            fanout_failures: self.fanout_failures.load(Ordering::Relaxed),
            chain_conflicts: self.chain_conflicts.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}
