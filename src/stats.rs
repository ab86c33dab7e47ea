use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by every concurrent request of a run
#[derive(Default, Debug)]
pub struct RunStats {
    pub pages_fetched: AtomicU64,
    pub pages_skipped: AtomicU64,
    pub records_extracted: AtomicU64,
    pub retries: AtomicU64,
    pub requests_skipped: AtomicU64,
    pub records_enriched: AtomicU64,
    pub entries_parsed: AtomicU64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_pages_fetched(&self) {
        self.pages_fetched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_pages_skipped(&self) {
        self.pages_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_records(&self, count: u64) {
        self.records_extracted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_retries(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_requests_skipped(&self) {
        self.requests_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_enriched(&self) {
        self.records_enriched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_entries_parsed(&self) {
        self.entries_parsed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pages(&self) -> u64 {
        self.pages_fetched.load(Ordering::Relaxed)
    }

    pub fn skipped_pages(&self) -> u64 {
        self.pages_skipped.load(Ordering::Relaxed)
    }

    pub fn records(&self) -> u64 {
        self.records_extracted.load(Ordering::Relaxed)
    }

    pub fn retry_count(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    pub fn skipped_requests(&self) -> u64 {
        self.requests_skipped.load(Ordering::Relaxed)
    }

    pub fn enriched(&self) -> u64 {
        self.records_enriched.load(Ordering::Relaxed)
    }

    pub fn entries(&self) -> u64 {
        self.entries_parsed.load(Ordering::Relaxed)
    }
}
