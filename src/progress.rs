//! Progress reporting for long-running mask computations.
//!
//! A [`ProgressReporter`] is created by the caller and passed into the run.
//! Reports go through `tracing` at `info` level every
//! `report_interval_pct` percent of the work.

use std::time::Instant;

use tracing::info;

/// Progress reporter over a known number of work units.
#[derive(Clone, Debug)]
pub struct ProgressReporter {
    /// Label printed with every report
    label: String,
    /// Start time (wall clock)
    start_instant: Instant,
    /// Total work units
    total: usize,
    /// Completed work units
    completed: usize,
    /// Last reported progress percentage
    last_reported_pct: u32,
    /// Report interval in percentage points, 0 disables reporting
    report_interval_pct: u32,
}

impl ProgressReporter {
    /// Create a reporter for `total` units, reporting every
    /// `report_interval_pct` percent.
    pub fn new(label: impl Into<String>, total: usize, report_interval_pct: u32) -> Self {
        Self {
            label: label.into(),
            start_instant: Instant::now(),
            total,
            completed: 0,
            last_reported_pct: 0,
            report_interval_pct,
        }
    }

    /// A reporter that never logs.
    pub fn silent() -> Self {
        Self::new("", 0, 0)
    }

    /// Reset the total, e.g. once the number of tiles is known.
    pub fn set_total(&mut self, total: usize) {
        self.total = total;
        self.completed = 0;
        self.last_reported_pct = 0;
        self.start_instant = Instant::now();
    }

    /// Number of units completed so far.
    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Current progress in percent.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            100.0 * self.completed.min(self.total) as f64 / self.total as f64
        }
    }

    /// Record `units` completed units and report if a threshold was crossed.
    ///
    /// Returns true if progress was reported.
    pub fn advance(&mut self, units: usize) -> bool {
        self.completed += units;
        if self.report_interval_pct == 0 {
            return false;
        }

        let pct = self.percent() as u32;
        let threshold = self.last_reported_pct + self.report_interval_pct;
        if pct >= threshold || (pct == 100 && self.last_reported_pct < 100) {
            self.report();
            self.last_reported_pct = (pct / self.report_interval_pct) * self.report_interval_pct;
            true
        } else {
            false
        }
    }

    fn report(&self) {
        let elapsed = self.start_instant.elapsed().as_secs_f64();
        let pct = self.percent();

        let eta = if pct > 0.1 {
            format_duration(elapsed * 100.0 / pct - elapsed)
        } else {
            "calculating...".to_string()
        };

        info!(
            "{}: [{:>5.1}%] {}/{} | elapsed={} | ETA={}",
            self.label,
            pct,
            self.completed,
            self.total,
            format_duration(elapsed),
            eta
        );
    }

    /// Log the final wall time.
    pub fn finish(&self) {
        if self.report_interval_pct == 0 {
            return;
        }
        info!(
            "{}: done in {}",
            self.label,
            format_duration(self.start_instant.elapsed().as_secs_f64())
        );
    }
}

/// Format a duration in seconds as a human-readable string.
fn format_duration(secs: f64) -> String {
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else if secs < 3600.0 {
        let mins = (secs / 60.0).floor();
        let s = secs - mins * 60.0;
        format!("{:.0}m{:.0}s", mins, s)
    } else {
        let hours = (secs / 3600.0).floor();
        let mins = ((secs - hours * 3600.0) / 60.0).floor();
        format!("{:.0}h{:.0}m", hours, mins)
    }
}
