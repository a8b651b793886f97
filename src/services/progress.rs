//! Progress reporting for acquisition runs
//!
//! The driver reports country, round and point events to a
//! [`ProgressReporter`]. Reporters are called from the single aggregation
//! point of a round, never from inside fetch workers.

use crate::acquisition::AcquisitionReport;

/// Trait for reporting progress during acquisitions
pub trait ProgressReporter: Send + Sync {
    /// A country acquisition starts with the given image quota
    fn on_country_start(&self, country: &str, quota: usize);

    /// A round dispatches `points` sample points
    fn on_round_start(&self, country: &str, round: usize, points: usize);

    /// One sample point finished
    ///
    /// # Arguments
    /// * `success` - Whether an image was written for the point
    /// * `successes` - Images written for the country so far
    /// * `quota` - Images needed for the country
    fn on_point_complete(&self, country: &str, success: bool, successes: usize, quota: usize);

    /// A country acquisition finished
    fn on_country_complete(&self, report: &AcquisitionReport);
}

/// No-op progress reporter that discards all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn on_country_start(&self, _country: &str, _quota: usize) {}

    fn on_round_start(&self, _country: &str, _round: usize, _points: usize) {}

    fn on_point_complete(&self, _country: &str, _success: bool, _successes: usize, _quota: usize) {
    }

    fn on_country_complete(&self, _report: &AcquisitionReport) {}
}

/// Progress reporter that writes through the `log` facade
#[derive(Debug, Clone, Copy)]
pub struct ConsoleProgressReporter {
    verbose: bool,
}

impl ConsoleProgressReporter {
    /// Create a new console progress reporter
    ///
    /// # Arguments
    /// * `verbose` - Whether to log every round and point
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn on_country_start(&self, country: &str, quota: usize) {
        log::info!("Downloading {} images from {}", quota, country);
    }

    fn on_round_start(&self, country: &str, round: usize, points: usize) {
        if self.verbose {
            log::info!("{}: round {} with {} sample points", country, round, points);
        }
    }

    fn on_point_complete(&self, country: &str, success: bool, successes: usize, quota: usize) {
        if self.verbose {
            log::debug!(
                "{}: point {} ({}/{})",
                country,
                if success { "saved" } else { "failed" },
                successes,
                quota
            );
        }
    }

    fn on_country_complete(&self, report: &AcquisitionReport) {
        log::info!(
            "Downloaded {} images from {} ({}, {} rounds, {:.1}s)",
            report.successes,
            report.country,
            report.termination,
            report.rounds,
            report.elapsed.as_secs_f64()
        );
    }
}

/// Progress bar reporter for the command line
///
/// Shows one bar per country, advanced by images written. The bar hides
/// itself when stderr is not a terminal.
#[cfg(feature = "cli")]
#[derive(Default)]
pub struct IndicatifProgressReporter {
    bar: std::sync::Mutex<Option<indicatif::ProgressBar>>,
}

#[cfg(feature = "cli")]
impl IndicatifProgressReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_bar(&self, f: impl FnOnce(&indicatif::ProgressBar)) {
        let guard = self
            .bar
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(bar) = guard.as_ref() {
            f(bar);
        }
    }
}

#[cfg(feature = "cli")]
impl ProgressReporter for IndicatifProgressReporter {
    fn on_country_start(&self, country: &str, quota: usize) {
        use indicatif::{ProgressBar, ProgressStyle};

        let bar = ProgressBar::new(quota as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.set_style(style);
        bar.set_message(format!("Downloading Images from {country}"));

        *self
            .bar
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(bar);
    }

    fn on_round_start(&self, country: &str, round: usize, points: usize) {
        self.with_bar(|bar| {
            bar.set_message(format!(
                "Downloading Images from {country} (round {round}, {points} points)"
            ));
        });
    }

    fn on_point_complete(&self, _country: &str, _success: bool, successes: usize, _quota: usize) {
        self.with_bar(|bar| bar.set_position(successes as u64));
    }

    fn on_country_complete(&self, report: &AcquisitionReport) {
        let bar = self
            .bar
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(bar) = bar {
            bar.finish_with_message(format!(
                "{} images from {} ({})",
                report.successes, report.country, report.termination
            ));
        }
    }
}

/// Create the progress reporter used by the command line front end
///
/// # Arguments
/// * `show_bar` - Render an interactive progress bar
/// * `verbose` - Log every round when no bar is shown
#[cfg(feature = "cli")]
#[must_use]
pub fn create_cli_progress_reporter(
    show_bar: bool,
    verbose: bool,
) -> std::sync::Arc<dyn ProgressReporter> {
    if show_bar {
        std::sync::Arc::new(IndicatifProgressReporter::new())
    } else {
        std::sync::Arc::new(ConsoleProgressReporter::new(verbose))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::Termination;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Test progress reporter that captures events for verification
    #[derive(Default)]
    struct TestProgressReporter {
        events: Arc<Mutex<Vec<String>>>,
    }

    impl ProgressReporter for TestProgressReporter {
        fn on_country_start(&self, country: &str, quota: usize) {
            self.events.lock().unwrap().push(format!("start {country} {quota}"));
        }

        fn on_round_start(&self, country: &str, round: usize, points: usize) {
            self.events
                .lock()
                .unwrap()
                .push(format!("round {country} {round} {points}"));
        }

        fn on_point_complete(&self, _country: &str, success: bool, successes: usize, _quota: usize) {
            self.events
                .lock()
                .unwrap()
                .push(format!("point {success} {successes}"));
        }

        fn on_country_complete(&self, report: &AcquisitionReport) {
            self.events
                .lock()
                .unwrap()
                .push(format!("done {}", report.termination));
        }
    }

    fn report() -> AcquisitionReport {
        AcquisitionReport {
            country: "France".to_string(),
            region: "Region 4".to_string(),
            target: 1,
            quota: 4,
            successes: 4,
            attempted: 4,
            rounds: 1,
            termination: Termination::QuotaReached,
            elapsed: Duration::from_millis(1500),
        }
    }

    #[test]
    fn test_reporters_as_trait_objects() {
        let reporters: Vec<Box<dyn ProgressReporter>> = vec![
            Box::new(NoOpProgressReporter),
            Box::new(ConsoleProgressReporter::new(true)),
            Box::new(ConsoleProgressReporter::new(false)),
        ];

        for reporter in &reporters {
            reporter.on_country_start("France", 4);
            reporter.on_round_start("France", 1, 4);
            reporter.on_point_complete("France", true, 1, 4);
            reporter.on_country_complete(&report());
        }
    }

    #[test]
    fn test_event_capture() {
        let reporter = TestProgressReporter::default();
        reporter.on_country_start("France", 4);
        reporter.on_round_start("France", 1, 4);
        reporter.on_point_complete("France", false, 0, 4);
        reporter.on_country_complete(&report());

        let events = reporter.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "start France 4",
                "round France 1 4",
                "point false 0",
                "done quota reached"
            ]
        );
    }
}
