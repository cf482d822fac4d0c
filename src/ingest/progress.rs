//! Per-project progress reporting.
//!
//! The orchestrator feeds a [`ProjectProgress`] after every item and logs
//! [`ProjectProgress::format_progress`] whenever
//! [`ProjectProgress::should_emit_update`] says so. The server's total is only
//! used for the percentage shown here; it never decides when a project ends.

use std::time::Duration;
use tokio::time::Instant;

const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_PERCENTAGE_STEP: f64 = 10.0;

/// Progress of one project run.
#[derive(Debug, Clone)]
pub struct ProjectProgress {
    /// Project key
    pub project: String,
    /// Items handled this run (emitted or skipped)
    pub items_processed: u64,
    /// Items completed in earlier runs
    pub previously_completed: u64,
    /// Total reported by the server, if seen yet
    pub total_reported: Option<u64>,
    /// Run start
    pub start_time: Instant,
    /// Last emitted update
    pub last_update: Instant,
    /// Minimum time between updates
    pub update_interval: Duration,
    /// Items per second this run
    pub current_rate: f64,
    /// Last reported percentage
    pub last_reported_percentage: f64,
    /// Percentage delta that forces an update
    pub min_percentage_step: f64,
}

impl ProjectProgress {
    /// Start tracking `project`, which already has `previously_completed` items done.
    pub fn new(project: impl Into<String>, previously_completed: u64) -> Self {
        let now = Instant::now();
        Self {
            project: project.into(),
            items_processed: 0,
            previously_completed,
            total_reported: None,
            start_time: now,
            last_update: now,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            current_rate: 0.0,
            last_reported_percentage: 0.0,
            min_percentage_step: DEFAULT_PERCENTAGE_STEP,
        }
    }

    /// Override the update cadence.
    pub fn with_update_interval(mut self, interval: Duration) -> Self {
        self.update_interval = interval;
        self
    }

    /// Record the server's total from the latest page.
    pub fn set_total_reported(&mut self, total: u64) {
        self.total_reported = Some(total);
    }

    /// Count `new_items` more processed items.
    pub fn update(&mut self, new_items: u64) {
        self.items_processed = self.items_processed.saturating_add(new_items);
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.current_rate = self.items_processed as f64 / elapsed;
        }
    }

    /// Whether an update is due by time or by percentage.
    pub fn should_emit_update(&self) -> bool {
        if self.items_processed == 0 {
            return false;
        }

        let percentage_jump = self
            .percentage()
            .is_some_and(|pct| pct - self.last_reported_percentage >= self.min_percentage_step);

        percentage_jump || self.last_update.elapsed() >= self.update_interval
    }

    /// Reset timers after an update was logged.
    pub fn mark_emitted(&mut self) {
        self.last_update = Instant::now();
        if let Some(pct) = self.percentage() {
            self.last_reported_percentage = pct;
        }
    }

    /// Share of the reported total already handled, across runs.
    pub fn percentage(&self) -> Option<f64> {
        let total = self.total_reported?;
        if total == 0 {
            return Some(100.0);
        }
        let done = self.previously_completed + self.items_processed;
        Some((done as f64 / total as f64 * 100.0).min(100.0))
    }

    /// Human-readable progress line.
    pub fn format_progress(&self) -> String {
        let mut parts = vec![format!(
            "[PROGRESS] {}: processed {} issues",
            self.project, self.items_processed
        )];

        if let Some(total) = self.total_reported {
            parts.push(format!(
                "({} of ~{total} overall",
                self.previously_completed + self.items_processed
            ));
            if let Some(pct) = self.percentage() {
                parts.push(format!("- {pct:.1}%)"));
            }
        }

        if self.current_rate > 0.0 {
            parts.push(format!("at {:.2} issues/sec", self.current_rate));
        }

        if let Some(remaining) = self.estimate_remaining() {
            parts.push(format!("- ~{} remaining", format_duration(remaining)));
        }

        parts.join(" ")
    }

    /// Remaining time at the current rate, if a total is known.
    pub fn estimate_remaining(&self) -> Option<Duration> {
        if self.current_rate <= 0.0 {
            return None;
        }
        let total = self.total_reported?;
        let remaining = total.saturating_sub(self.previously_completed + self.items_processed);
        (remaining > 0).then(|| Duration::from_secs_f64(remaining as f64 / self.current_rate))
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{:.1}h", secs as f64 / 3600.0)
    }
}
