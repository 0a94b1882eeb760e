use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Counters for one CLI run or one workflow session.
///
/// The client records backend traffic. The dossier service records what it
/// had to absorb locally: refused uploads, skipped quota checks and writes
/// whose refetch failed.
#[derive(Debug, Default)]
pub struct DossierMetrics {
    requests: AtomicU64,
    throttled: AtomicU64,
    backend_errors: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    rejected_uploads: AtomicU64,
    quota_refusals: AtomicU64,
    quota_checks_skipped: AtomicU64,
    refetch_fallbacks: AtomicU64,
}

/// Point-in-time copy of [`DossierMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub throttled: u64,
    pub backend_errors: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub rejected_uploads: u64,
    pub quota_refusals: u64,
    pub quota_checks_skipped: u64,
    pub refetch_fallbacks: u64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl DossierMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        bump(&self.requests);
    }

    /// The rate limiter made a request wait.
    pub fn record_throttled(&self) {
        bump(&self.throttled);
    }

    pub fn record_backend_error(&self) {
        bump(&self.backend_errors);
    }

    pub fn record_cache_lookup(&self, hit: bool) {
        bump(if hit { &self.cache_hits } else { &self.cache_misses });
    }

    /// Format or size check refused a file before any request.
    pub fn record_rejected_upload(&self) {
        bump(&self.rejected_uploads);
    }

    pub fn record_quota_refusal(&self) {
        bump(&self.quota_refusals);
    }

    pub fn record_quota_check_skipped(&self) {
        bump(&self.quota_checks_skipped);
    }

    /// A write succeeded but its refetch did not; the acknowledged document was kept.
    pub fn record_refetch_fallback(&self) {
        bump(&self.refetch_fallbacks);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let read = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        MetricsSnapshot {
            requests: read(&self.requests),
            throttled: read(&self.throttled),
            backend_errors: read(&self.backend_errors),
            cache_hits: read(&self.cache_hits),
            cache_misses: read(&self.cache_misses),
            rejected_uploads: read(&self.rejected_uploads),
            quota_refusals: read(&self.quota_refusals),
            quota_checks_skipped: read(&self.quota_checks_skipped),
            refetch_fallbacks: read(&self.refetch_fallbacks),
        }
    }

    pub fn log_summary(&self) {
        let stats = self.snapshot();
        info!(
            requests = stats.requests,
            throttled = stats.throttled,
            backend_errors = stats.backend_errors,
            cache_hits = stats.cache_hits,
            cache_misses = stats.cache_misses,
            "Compliance API traffic"
        );
        if stats.degraded() {
            warn!(
                rejected_uploads = stats.rejected_uploads,
                quota_refusals = stats.quota_refusals,
                quota_checks_skipped = stats.quota_checks_skipped,
                refetch_fallbacks = stats.refetch_fallbacks,
                "Dossier actions completed in degraded mode"
            );
        }
    }
}

impl MetricsSnapshot {
    /// True when a check was skipped or a write could not be read back.
    pub fn degraded(&self) -> bool {
        self.quota_checks_skipped > 0 || self.refetch_fallbacks > 0
    }
}

/// Times one workflow action from start to outcome.
///
/// The action name doubles as the busy marker of the workflow controller.
#[derive(Debug)]
pub struct ActionTimer {
    action: &'static str,
    started: Instant,
}

impl ActionTimer {
    pub fn start(action: &'static str) -> Self {
        Self {
            action,
            started: Instant::now(),
        }
    }

    pub fn action(&self) -> &'static str {
        self.action
    }

    /// Log the outcome with its duration and return the elapsed time.
    pub fn finish<T, E: Display>(self, result: &Result<T, E>) -> Duration {
        let elapsed = self.started.elapsed();
        match result {
            Ok(_) => info!(
                action = self.action,
                duration_ms = elapsed.as_millis(),
                "Action succeeded"
            ),
            Err(err) => info!(
                action = self.action,
                duration_ms = elapsed.as_millis(),
                error = %err,
                "Action failed"
            ),
        }
        elapsed
    }
}
