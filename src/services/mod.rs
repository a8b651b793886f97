//! Services shared by the library and the command line front end

pub mod progress;

pub use progress::{ConsoleProgressReporter, NoOpProgressReporter, ProgressReporter};
#[cfg(feature = "cli")]
pub use progress::{create_cli_progress_reporter, IndicatifProgressReporter};
