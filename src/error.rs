//! Error types for sampling and acquisition operations

use thiserror::Error;

/// Result type alias for scraper operations
pub type Result<T> = std::result::Result<T, ScraperError>;

/// Error taxonomy for the acquisition pipeline
///
/// Country and region level failures (`UnknownCountry`,
/// `GeometrySourceUnavailable`) propagate to the caller. Point level failures
/// (`Http`, `Network`, `InvalidResponse`, `Io`) never leave a fetch worker;
/// they are logged and tallied as zero.
#[derive(Error, Debug)]
pub enum ScraperError {
    /// Country is not listed in any region of the country index
    #[error("Unknown country: {0} is not mapped to any region")]
    UnknownCountry(String),

    /// Region geometry dataset is missing, unreadable or corrupt
    #[error("Geometry source unavailable for {region}: {reason}")]
    GeometrySourceUnavailable { region: String, reason: String },

    /// Provider answered with a non-success HTTP status (retried)
    #[error("HTTP error {status} from {url}")]
    Http { status: u16, url: String },

    /// Transport failure that is not an HTTP status (connect, timeout, body read)
    #[error("Network error: {0}")]
    Network(String),

    /// Provider response could not be interpreted
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Acquisition stopped through its cancellation token
    #[error("Acquisition cancelled")]
    Cancelled,
}

impl ScraperError {
    /// Create a new unknown country error
    pub fn unknown_country<S: Into<String>>(country: S) -> Self {
        Self::UnknownCountry(country.into())
    }

    /// Create a new geometry source error for a region
    pub fn geometry_unavailable<R: Into<String>, S: Into<String>>(region: R, reason: S) -> Self {
        Self::GeometrySourceUnavailable {
            region: region.into(),
            reason: reason.into(),
        }
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new invalid response error
    pub fn invalid_response<S: Into<String>>(msg: S) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Create a network error from any displayable transport failure
    pub fn network_error<S: Into<String>, E: std::fmt::Display>(context: S, error: E) -> Self {
        Self::Network(format!("{}: {}", context.into(), error))
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Whether a fetch attempt that failed with this error should be retried
    ///
    /// Only provider HTTP status errors are transient. Everything else aborts
    /// the point immediately.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Http { .. })
    }

    /// Whether this error ends the acquisition of a whole country
    #[must_use]
    pub fn is_country_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnknownCountry(_) | Self::GeometrySourceUnavailable { .. } | Self::Cancelled
        )
    }
}
