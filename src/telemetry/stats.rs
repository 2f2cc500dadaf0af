use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Process-wide counters shared by the bridge, the report consumer and the
/// debug endpoint.
#[derive(Debug)]
pub struct Stats {
    start_time: Instant,
    messages_received: AtomicU64,
    items_submitted: AtomicU64,
    items_rejected: AtomicU64,
    reports_delivered: AtomicU64,
    reports_failed: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            messages_received: AtomicU64::new(0),
            items_submitted: AtomicU64::new(0),
            items_rejected: AtomicU64::new(0),
            reports_delivered: AtomicU64::new(0),
            reports_failed: AtomicU64::new(0),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn inc_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_submitted(&self) {
        self.items_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rejected(&self) {
        self.items_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_delivered(&self) {
        self.reports_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failed(&self) {
        self.reports_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    pub fn items_submitted(&self) -> u64 {
        self.items_submitted.load(Ordering::Relaxed)
    }

    pub fn items_rejected(&self) -> u64 {
        self.items_rejected.load(Ordering::Relaxed)
    }

    pub fn reports_delivered(&self) -> u64 {
        self.reports_delivered.load(Ordering::Relaxed)
    }

    pub fn reports_failed(&self) -> u64 {
        self.reports_failed.load(Ordering::Relaxed)
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}
