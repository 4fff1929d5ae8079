//! Error types for fetching, parsing and writing the class catalog.

use thiserror::Error;

/// Errors that can occur while talking to LionPath or writing results.
#[derive(Debug, Error, Clone)]
pub enum ScrapeError {
    /// Network/HTTP request failed
    #[error("Network error: {message}")]
    Network { message: String },

    /// Server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// The class search page could not be used at all
    #[error("Class search unavailable: {message}")]
    SearchUnavailable { message: String },

    /// A detail reference could not be turned back into its identifiers
    #[error("Invalid class reference: {reference}")]
    InvalidClassRef { reference: String },

    /// URL parsing/construction failed
    #[error("URL error: {message}")]
    UrlError { message: String },

    /// Writing the output file failed
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Serializing results failed
    #[error("Serialization error: {message}")]
    Serialize { message: String },
}

impl ScrapeError {
    /// Returns true if this error is potentially transient and retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            ScrapeError::Network { .. } => true,
            ScrapeError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ScrapeError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => ScrapeError::HttpStatus {
                status: status.as_u16(),
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            },
            None => ScrapeError::Network {
                message: err.to_string(),
            },
        }
    }
}

impl From<url::ParseError> for ScrapeError {
    fn from(err: url::ParseError) -> Self {
        ScrapeError::UrlError {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for ScrapeError {
    fn from(err: std::io::Error) -> Self {
        ScrapeError::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ScrapeError {
    fn from(err: serde_json::Error) -> Self {
        ScrapeError::Serialize {
            message: err.to_string(),
        }
    }
}

impl From<csv::Error> for ScrapeError {
    fn from(err: csv::Error) -> Self {
        ScrapeError::Serialize {
            message: err.to_string(),
        }
    }
}

/// Why a single field could not be read off a page.
///
/// Misses are expected on every page; they are collected for diagnostics and never
/// abort parsing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractionMiss {
    /// No label or pattern for the field matched
    #[error("{field}: not found")]
    NotFound { field: &'static str },

    /// The page showed the site's "nothing here" placeholder
    #[error("{field}: placeholder text {value:?}")]
    Placeholder { field: &'static str, value: String },

    /// A value was found but is too short to be real content
    #[error("{field}: only {len} characters")]
    TooShort { field: &'static str, len: usize },

    /// A count field held something other than an integer
    #[error("{field}: {value:?} is not a number")]
    NotNumeric { field: &'static str, value: String },

    /// A time or date did not parse
    #[error("{field}: malformed value {value:?}")]
    Malformed { field: &'static str, value: String },
}

impl ExtractionMiss {
    /// Name of the field this miss belongs to.
    pub fn field(&self) -> &'static str {
        match self {
            ExtractionMiss::NotFound { field }
            | ExtractionMiss::Placeholder { field, .. }
            | ExtractionMiss::TooShort { field, .. }
            | ExtractionMiss::NotNumeric { field, .. }
            | ExtractionMiss::Malformed { field, .. } => *field,
        }
    }
}
