//! Per-task progress state and aggregate snapshots.
//!
//! Each entry has exactly one writer (the task that owns its
//! [`ProgressHandle`]); the render loop is the only concurrent reader and
//! tolerates staleness. Only the container of all entries is locked, and
//! only while registering or while cloning a snapshot out. Rendering always
//! happens outside that lock, so a renderer can never re-enter it.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct EntryState {
    description: Mutex<String>,
    total: AtomicU64,
    has_total: AtomicBool,
    indeterminate: AtomicBool,
    started: AtomicBool,
    completed: AtomicU64,
    finished: AtomicBool,
    failed: AtomicBool,
}

/// Writer handle to one progress entry. Owned by exactly one task.
#[derive(Debug, Clone)]
pub struct ProgressHandle {
    state: Arc<EntryState>,
}

impl ProgressHandle {
    /// Replaces the display description.
    pub fn set_description(&self, description: impl Into<String>) {
        if let Ok(mut d) = self.state.description.lock() {
            *d = description.into();
        }
    }

    /// Records the expected total once, at transfer start.
    ///
    /// `None` or zero marks the entry indeterminate; it will never report a
    /// percentage. Subsequent calls are ignored.
    pub fn start(&self, total: Option<u64>) {
        if self.state.started.swap(true, Ordering::AcqRel) {
            return;
        }
        match total.filter(|&t| t > 0) {
            Some(t) => {
                self.state.total.store(t, Ordering::Release);
                self.state.has_total.store(true, Ordering::Release);
            }
            None => self.state.indeterminate.store(true, Ordering::Release),
        }
    }

    /// Adds durably-written bytes. Call after each successful write.
    pub fn inc(&self, bytes: u64) {
        self.state.completed.fetch_add(bytes, Ordering::AcqRel);
    }

    /// Marks the entry finished, bumping `completed` to the full total to
    /// cover any rounding shortfall. Monotonic: never reverts.
    pub fn finish(&self) {
        if self.state.has_total.load(Ordering::Acquire) {
            let total = self.state.total.load(Ordering::Acquire);
            self.state.completed.fetch_max(total, Ordering::AcqRel);
        }
        self.state.finished.store(true, Ordering::Release);
    }

    /// Marks the entry failed. A failed entry never reports finished.
    pub fn fail(&self, reason: &str) {
        self.set_description(format!("failed: {reason}"));
        self.state.failed.store(true, Ordering::Release);
    }
}

/// Read-only view of one entry at snapshot time.
#[derive(Debug, Clone)]
pub struct EntryView {
    /// Current display description.
    pub description: String,
    /// Bytes written so far, clamped to `total` when known.
    pub completed: u64,
    /// Expected byte count, when known.
    pub total: Option<u64>,
    /// True when the total is unknown; the entry never shows a percentage.
    pub indeterminate: bool,
    /// True once the transfer completed successfully.
    pub finished: bool,
    /// True once the transfer failed.
    pub failed: bool,
}

impl EntryView {
    /// Completion percentage in `0.0..=100.0`, `None` for indeterminate
    /// entries that have not finished.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent(&self) -> Option<f64> {
        if self.finished {
            return Some(100.0);
        }
        if self.indeterminate {
            return None;
        }
        self.total
            .map(|t| (self.completed as f64 / t as f64 * 100.0).min(100.0))
    }

    /// True once the entry reached a terminal state, success or failure.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        self.finished || self.failed
    }
}

/// Registry of all progress entries for one download invocation.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    entries: Mutex<Vec<Arc<EntryState>>>,
}

impl ProgressTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new entry and returns its writer handle.
    pub fn register(&self, description: impl Into<String>) -> ProgressHandle {
        let state = Arc::new(EntryState {
            description: Mutex::new(description.into()),
            ..EntryState::default()
        });
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(Arc::clone(&state));
        }
        ProgressHandle { state }
    }

    /// Clones the current state of every entry, in registration order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<EntryView> {
        let entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries
            .iter()
            .map(|state| {
                let has_total = state.has_total.load(Ordering::Acquire);
                let total = has_total.then(|| state.total.load(Ordering::Acquire));
                let mut completed = state.completed.load(Ordering::Acquire);
                if let Some(t) = total {
                    completed = completed.min(t);
                }
                EntryView {
                    description: state
                        .description
                        .lock()
                        .map(|d| d.clone())
                        .unwrap_or_default(),
                    completed,
                    total,
                    indeterminate: state.indeterminate.load(Ordering::Acquire),
                    finished: state.finished.load(Ordering::Acquire),
                    failed: state.failed.load(Ordering::Acquire),
                }
            })
            .collect()
    }

    /// True once every registered entry reached a terminal state.
    #[must_use]
    pub fn all_settled(&self) -> bool {
        self.snapshot().iter().all(EntryView::is_settled)
    }
}

/// Orders entries for display: highest completion first, indeterminate ones
/// last. Stable for equal percentages.
pub fn display_order(entries: &mut [EntryView]) {
    entries.sort_by(|a, b| {
        let pa = a.percent().unwrap_or(-1.0);
        let pb = b.percent().unwrap_or(-1.0);
        pb.partial_cmp(&pa).unwrap_or(std::cmp::Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_is_monotonic_and_clamped() {
        let tracker = ProgressTracker::new();
        let handle = tracker.register("waiting");
        handle.start(Some(100));

        handle.inc(40);
        let view = &tracker.snapshot()[0];
        assert_eq!(view.completed, 40);
        assert_eq!(view.percent(), Some(40.0));

        // Over-report beyond the declared total: the view clamps.
        handle.inc(90);
        let view = &tracker.snapshot()[0];
        assert_eq!(view.completed, 100);
        assert_eq!(view.percent(), Some(100.0));
        assert!(!view.finished);
    }

    #[test]
    fn finish_covers_rounding_shortfall() {
        let tracker = ProgressTracker::new();
        let handle = tracker.register("waiting");
        handle.start(Some(1000));
        handle.inc(997);
        handle.finish();

        let view = &tracker.snapshot()[0];
        assert!(view.finished);
        assert_eq!(view.completed, view.total.unwrap());
        assert_eq!(view.percent(), Some(100.0));
    }

    #[test]
    fn indeterminate_never_reports_percent() {
        let tracker = ProgressTracker::new();
        let handle = tracker.register("waiting");
        handle.start(None);
        handle.inc(5000);

        let view = &tracker.snapshot()[0];
        assert!(view.indeterminate);
        assert_eq!(view.percent(), None);

        // Finishing an indeterminate entry still settles it.
        handle.finish();
        let view = &tracker.snapshot()[0];
        assert!(view.finished);
        assert_eq!(view.percent(), Some(100.0));
    }

    #[test]
    fn zero_total_is_indeterminate() {
        let tracker = ProgressTracker::new();
        let handle = tracker.register("waiting");
        handle.start(Some(0));
        assert!(tracker.snapshot()[0].indeterminate);
    }

    #[test]
    fn start_is_set_once() {
        let tracker = ProgressTracker::new();
        let handle = tracker.register("waiting");
        handle.start(Some(100));
        handle.start(None);

        let view = &tracker.snapshot()[0];
        assert!(!view.indeterminate);
        assert_eq!(view.total, Some(100));
    }

    #[test]
    fn failed_entries_settle_without_finishing() {
        let tracker = ProgressTracker::new();
        let handle = tracker.register("waiting");
        handle.start(Some(100));
        handle.inc(30);
        handle.fail("connection reset");

        let view = &tracker.snapshot()[0];
        assert!(view.failed);
        assert!(!view.finished);
        assert!(view.is_settled());
        assert!(view.description.starts_with("failed:"));
        assert!(tracker.all_settled());
    }

    #[test]
    fn display_order_sorts_by_descending_percent() {
        let tracker = ProgressTracker::new();
        let low = tracker.register("low");
        low.start(Some(100));
        low.inc(10);
        let high = tracker.register("high");
        high.start(Some(100));
        high.inc(90);
        let unknown = tracker.register("unknown");
        unknown.start(None);
        unknown.inc(12345);

        let mut snap = tracker.snapshot();
        display_order(&mut snap);
        assert_eq!(snap[0].description, "high");
        assert_eq!(snap[1].description, "low");
        assert_eq!(snap[2].description, "unknown");
    }

    #[test]
    fn snapshot_preserves_registration_order() {
        let tracker = ProgressTracker::new();
        tracker.register("a");
        tracker.register("b");
        let snap = tracker.snapshot();
        assert_eq!(snap[0].description, "a");
        assert_eq!(snap[1].description, "b");
    }
}
