use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Per-run counters for the fetch client, folded into run metadata and
/// printed in the report footer.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FetchStats {
    pub requests_issued: u64,
    pub pages_fetched: u64,
    pub rate_limit_waits: u64,
    pub transient_retries: u64,
}

#[derive(Debug, Default)]
pub struct FetchStatsCollector {
    inner: Mutex<FetchStats>,
}

impl FetchStatsCollector {
    pub fn record_request(&self) {
        self.inner.lock().unwrap().requests_issued += 1;
    }

    pub fn record_page(&self) {
        self.inner.lock().unwrap().pages_fetched += 1;
    }

    pub fn record_rate_limit_wait(&self) {
        self.inner.lock().unwrap().rate_limit_waits += 1;
    }

    pub fn record_transient_retry(&self) {
        self.inner.lock().unwrap().transient_retries += 1;
    }

    pub fn snapshot(&self) -> FetchStats {
        *self.inner.lock().unwrap()
    }
}
