use thiserror::Error;
use tracing::{error, warn};

/// Failures that cross the resolution pipeline boundary.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Invalid post URL: {reason}")]
    ValidationError { reason: String },

    #[error("Failed to resolve share link: {0}")]
    ResolutionError(String),

    #[error("No downloadable media found")]
    NoMediaFound,

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Failed to build HTTP client: {0}")]
    ClientBuildError(String),
}

impl ResolveError {
    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        ResolveError::ValidationError {
            reason: reason.into(),
        }
    }

    /// HTTP status the routing layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            ResolveError::ValidationError { .. } => 400,
            ResolveError::NoMediaFound => 404,
            ResolveError::ResolutionError(_) => 502,
            ResolveError::UpstreamUnavailable(_) => 503,
            ResolveError::ClientBuildError(_) => 500,
        }
    }

    /// Only upstream outages are worth retrying by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ResolveError::UpstreamUnavailable(_))
    }

    pub fn log(&self) {
        match self {
            ResolveError::ValidationError { reason } => {
                warn!(reason = %reason, "URL validation failed");
            }
            ResolveError::ResolutionError(e) => {
                error!(error = %e, "Share link resolution failed");
            }
            ResolveError::NoMediaFound => {
                warn!("No media found for post");
            }
            ResolveError::UpstreamUnavailable(e) => {
                error!(error = %e, "Upstream service unavailable");
            }
            ResolveError::ClientBuildError(e) => {
                error!(error = %e, "HTTP client construction failed");
            }
        }
    }
}

/// A single fetch-and-normalize attempt that produced nothing usable.
///
/// Never leaves the crate; the strategy chain turns it into the next
/// decision (fall back, or classify the overall failure).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StrategyFailure {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("undecodable response body: {0}")]
    InvalidBody(String),

    #[error("response contained no media")]
    Empty,
}

impl StrategyFailure {
    /// Whether the upstream could not be reached or answered abnormally,
    /// as opposed to answering "there is nothing here".
    pub fn is_unavailable(&self) -> bool {
        match self {
            StrategyFailure::Transport(_)
            | StrategyFailure::Timeout
            | StrategyFailure::InvalidBody(_) => true,
            StrategyFailure::Status(code) => *code != 404,
            StrategyFailure::Empty => false,
        }
    }
}

impl From<reqwest::Error> for StrategyFailure {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            StrategyFailure::Timeout
        } else if e.is_decode() {
            StrategyFailure::InvalidBody(e.to_string())
        } else if let Some(status) = e.status() {
            StrategyFailure::Status(status.as_u16())
        } else {
            StrategyFailure::Transport(e.to_string())
        }
    }
}
