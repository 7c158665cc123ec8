use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::evaluation::Bucket;

#[derive(Debug, Default)]
pub struct Metrics {
    pub items_total: AtomicU64,
    pub items_accepted: AtomicU64,
    pub items_rejected: AtomicU64,
    pub items_failed: AtomicU64,
    pub calls_completed: AtomicU64,
    pub retries_total: AtomicU64,
    pub polls_total: AtomicU64,
    pub checkpoint_saves: AtomicU64,
    current_item: RwLock<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub items_total: u64,
    pub items_accepted: u64,
    pub items_rejected: u64,
    pub items_failed: u64,
    pub calls_completed: u64,
    pub retries_total: u64,
    pub polls_total: u64,
    pub checkpoint_saves: u64,
    pub current_item: Option<String>,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn start_item(&self, item_id: &str) {
        *self.current_item.write() = Some(item_id.to_string());
    }

    pub fn record_classified(&self, bucket: Bucket) {
        self.items_total.fetch_add(1, Ordering::Relaxed);
        match bucket {
            Bucket::Accepted => self.items_accepted.fetch_add(1, Ordering::Relaxed),
            Bucket::Rejected => self.items_rejected.fetch_add(1, Ordering::Relaxed),
        };
        self.current_item.write().take();
    }

    pub fn record_call(&self, failed: bool) {
        self.items_total.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.items_failed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.calls_completed.fetch_add(1, Ordering::Relaxed);
        }
        self.current_item.write().take();
    }

    pub fn record_failure(&self) {
        self.items_total.fetch_add(1, Ordering::Relaxed);
        self.items_failed.fetch_add(1, Ordering::Relaxed);
        self.current_item.write().take();
    }

    /// `attempts` is the total attempt count for one item; only the extra
    /// attempts are counted as retries.
    pub fn record_attempts(&self, attempts: u32) {
        let retries = u64::from(attempts.saturating_sub(1));
        self.retries_total.fetch_add(retries, Ordering::Relaxed);
    }

    pub fn record_polls(&self, polls: u32) {
        self.polls_total.fetch_add(u64::from(polls), Ordering::Relaxed);
    }

    pub fn record_checkpoint_save(&self) {
        self.checkpoint_saves.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            items_total: self.items_total.load(Ordering::Relaxed),
            items_accepted: self.items_accepted.load(Ordering::Relaxed),
            items_rejected: self.items_rejected.load(Ordering::Relaxed),
            items_failed: self.items_failed.load(Ordering::Relaxed),
            calls_completed: self.calls_completed.load(Ordering::Relaxed),
            retries_total: self.retries_total.load(Ordering::Relaxed),
            polls_total: self.polls_total.load(Ordering::Relaxed),
            checkpoint_saves: self.checkpoint_saves.load(Ordering::Relaxed),
            current_item: self.current_item.read().clone(),
        }
    }

    pub fn render_prometheus(&self) -> String {
        let s = self.snapshot();

        format!(
            "# HELP screening_runner_items_total Work items resolved in this process.\n\
             # TYPE screening_runner_items_total counter\n\
             screening_runner_items_total {}\n\
             # HELP screening_runner_items_accepted Items classified as accepted.\n\
             # TYPE screening_runner_items_accepted counter\n\
             screening_runner_items_accepted {}\n\
             # HELP screening_runner_items_rejected Items classified as rejected.\n\
             # TYPE screening_runner_items_rejected counter\n\
             screening_runner_items_rejected {}\n\
             # HELP screening_runner_items_failed Items written to the failure log.\n\
             # TYPE screening_runner_items_failed counter\n\
             screening_runner_items_failed {}\n\
             # HELP screening_runner_calls_completed Calls that reached a successful end.\n\
             # TYPE screening_runner_calls_completed counter\n\
             screening_runner_calls_completed {}\n\
             # HELP screening_runner_retries_total Scoring attempts beyond the first.\n\
             # TYPE screening_runner_retries_total counter\n\
             screening_runner_retries_total {}\n\
             # HELP screening_runner_polls_total Call status polls issued.\n\
             # TYPE screening_runner_polls_total counter\n\
             screening_runner_polls_total {}\n\
             # HELP screening_runner_checkpoint_saves Successful checkpoint saves.\n\
             # TYPE screening_runner_checkpoint_saves counter\n\
             screening_runner_checkpoint_saves {}\n",
            s.items_total,
            s.items_accepted,
            s.items_rejected,
            s.items_failed,
            s.calls_completed,
            s.retries_total,
            s.polls_total,
            s.checkpoint_saves
        )
    }
}
