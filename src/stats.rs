//! Client request statistics.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;

/// Snapshot of client counters.
///
/// `requests` counts top-level calls (retries excluded).
/// `avg_response_time` is the running mean over successful network
/// responses: `(avg * (n - 1) + t) / n`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClientStats {
    pub requests: u64,
    pub successes: u64,
    pub errors: u64,
    pub retries: u64,
    pub cache_hits: u64,
    pub rate_limited: u64,
    #[serde(serialize_with = "serialize_millis")]
    pub avg_response_time: Duration,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64() * 1000.0)
}

/// Shared, lock-guarded counters behind [`ClientStats`].
#[derive(Default)]
pub(crate) struct StatsRecorder {
    inner: Mutex<ClientStats>,
}

impl StatsRecorder {
    fn update(&self, f: impl FnOnce(&mut ClientStats)) {
        f(&mut self.inner.lock().unwrap_or_else(PoisonError::into_inner));
    }

    pub(crate) fn snapshot(&self) -> ClientStats {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn reset(&self) {
        self.update(|s| *s = ClientStats::default());
    }

    pub(crate) fn record_request(&self) {
        self.update(|s| s.requests += 1);
    }

    pub(crate) fn record_success(&self, response_time: Duration) {
        self.update(|s| {
            s.successes += 1;
            let n = s.successes as f64;
            let avg = s.avg_response_time.as_secs_f64();
            let next = (avg * (n - 1.0) + response_time.as_secs_f64()) / n;
            s.avg_response_time = Duration::from_secs_f64(next);
        });
    }

    pub(crate) fn record_error(&self) {
        self.update(|s| s.errors += 1);
    }

    pub(crate) fn record_retry(&self) {
        self.update(|s| s.retries += 1);
    }

    pub(crate) fn record_cache_hit(&self) {
        self.update(|s| s.cache_hits += 1);
    }

    pub(crate) fn record_rate_limited(&self) {
        self.update(|s| s.rate_limited += 1);
    }
}
