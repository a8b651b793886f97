//! Tracing configuration module for structured logging and observability
//!
//! Applications configure the subscriber (see [`TracingConfig::init`], behind
//! the `cli` feature); the library itself only emits events through the
//! [`spans`] and [`events`] helpers.

#[cfg(feature = "cli")]
use tracing_subscriber::{
    fmt, layer::Layered, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
    Registry,
};

#[cfg(feature = "cli")]
type BoxedLayer = Box<dyn Layer<Layered<EnvFilter, Registry>> + Send + Sync>;

/// Configuration for tracing output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable console output with colors (default for CLI)
    Console,
    /// Compact console output for CI environments
    Compact,
    /// JSON structured logging for production environments
    #[cfg(feature = "tracing-json")]
    Json,
}

/// Configuration for tracing output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TracingOutput {
    /// Output to stderr (default)
    Console,
    /// Stderr plus a log file at the given path
    #[cfg(feature = "tracing-files")]
    ConsoleAndFile(std::path::PathBuf),
}

/// Tracing configuration builder
#[derive(Debug)]
pub struct TracingConfig {
    /// Verbosity level (maps to log levels)
    pub verbosity: u8,
    pub format: TracingFormat,
    pub output: TracingOutput,
    /// Environment filter string (overrides verbosity if set)
    pub env_filter: Option<String>,
    /// Session ID for correlation
    pub session_id: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            format: TracingFormat::Console,
            output: TracingOutput::Console,
            env_filter: None,
            session_id: None,
        }
    }
}

/// Keeps background log writers alive; drop it at the end of `main`
#[derive(Default)]
#[must_use = "dropping the guard stops file logging"]
pub struct TracingGuard {
    #[cfg(feature = "tracing-files")]
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

impl TracingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity level (0-2+)
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_output(mut self, output: TracingOutput) -> Self {
        self.output = output;
        self
    }

    /// Set custom environment filter
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Set session ID for run correlation
    pub fn with_session_id<S: Into<String>>(mut self, session_id: S) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Convert verbosity level to tracing filter string
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Initialize the global subscriber
    ///
    /// Fails if the filter directives are invalid or a subscriber is already
    /// installed.
    #[cfg(feature = "cli")]
    pub fn init(self) -> anyhow::Result<TracingGuard> {
        let filter = EnvFilter::try_new(
            self.env_filter
                .as_deref()
                .unwrap_or_else(|| self.verbosity_to_filter()),
        )?;

        #[allow(unused_mut)]
        let mut guard = TracingGuard::default();
        #[allow(unused_mut)]
        let mut layers = vec![self.console_layer()];

        #[cfg(feature = "tracing-files")]
        if let TracingOutput::ConsoleAndFile(path) = &self.output {
            let (file_layer, file_guard) = self.file_layer(path);
            layers.push(file_layer);
            guard._file_guard = Some(file_guard);
        }

        Registry::default().with(filter).with(layers).try_init()?;

        if let Some(session_id) = &self.session_id {
            tracing::info!(session_id = %session_id, "Acquisition session started");
        }

        Ok(guard)
    }

    #[cfg(feature = "cli")]
    fn console_layer(&self) -> BoxedLayer {
        let layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

        match self.format {
            TracingFormat::Console => layer.with_ansi(true).compact().boxed(),
            TracingFormat::Compact => layer.with_ansi(false).compact().boxed(),
            #[cfg(feature = "tracing-json")]
            TracingFormat::Json => layer
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .boxed(),
        }
    }

    /// Plain-text (or JSON) layer appending to `path`
    #[cfg(all(feature = "cli", feature = "tracing-files"))]
    fn file_layer(
        &self,
        path: &std::path::Path,
    ) -> (BoxedLayer, tracing_appender::non_blocking::WorkerGuard) {
        let directory = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| std::path::Path::new("."));
        let file_name = path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("streetview-scraper.log"));

        let (writer, guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::never(directory, file_name));
        let layer = fmt::layer().with_ansi(false).with_writer(writer);

        let layer = match self.format {
            #[cfg(feature = "tracing-json")]
            TracingFormat::Json => layer
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .boxed(),
            #[allow(unreachable_patterns)]
            _ => layer.compact().boxed(),
        };
        (layer, guard)
    }
}

/// Span creation helpers for pipeline stages
pub mod spans {
    use tracing::{Level, Span};

    /// Whole acquisition of one country
    pub fn country(country: &str, target: usize, quota: usize) -> Span {
        tracing::span!(
            Level::INFO,
            "country",
            country = %country,
            target = target,
            quota = quota
        )
    }

    /// One sampling and dispatch round
    pub fn round(round: usize, budget: usize) -> Span {
        tracing::span!(Level::INFO, "round", round = round, budget = budget)
    }

    /// Validate-then-fetch of one sample point
    pub fn fetch(latitude: f64, longitude: f64, heading: u16) -> Span {
        tracing::span!(
            Level::DEBUG,
            "fetch",
            latitude = latitude,
            longitude = longitude,
            heading = heading
        )
    }

    pub fn region_load(region: &str) -> Span {
        tracing::span!(Level::INFO, "region_load", region = %region)
    }
}

/// Event helpers for common logging patterns
pub mod events {
    use tracing::{debug, warn};

    pub fn cache_hit(region: &str) {
        debug!(region = %region, "Geometry cache hit");
    }

    pub fn cache_miss(region: &str) {
        debug!(region = %region, "Geometry cache miss");
    }

    /// Log a sample point that produced no image
    pub fn point_failed(point: &dyn std::fmt::Display, attempts: u32, reason: &str) {
        warn!(point = %point, attempts = attempts, reason = %reason, "Point failed");
    }
}
