use thiserror::Error;

/// Failures surfaced by the dispatch engine and its adapters.
///
/// A missing record is not an error: cache lookups return `Ok(None)`.
#[derive(Debug, Error)]
pub enum Error {
    /// The event carries no stable identifier for its target.
    #[error("unresolvable identity: {reason}")]
    UnresolvableIdentity { reason: String },

    #[error("reference store unavailable: {source}")]
    StoreUnavailable {
        #[source]
        source: herald_store::Error,
    },

    #[error("platform call failed: {operation}: {source}")]
    PlatformCallFailed {
        operation: &'static str,
        #[source]
        source: herald_msteams::Error,
    },

    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    #[error("not configured: {message}")]
    NotConfigured { message: String },
}

impl Error {
    #[must_use]
    pub fn unresolvable(reason: impl Into<String>) -> Self {
        Self::UnresolvableIdentity {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_configured(message: impl Into<String>) -> Self {
        Self::NotConfigured {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn platform(operation: &'static str) -> impl FnOnce(herald_msteams::Error) -> Self {
        move |source| Self::PlatformCallFailed { operation, source }
    }
}

impl From<herald_store::Error> for Error {
    fn from(source: herald_store::Error) -> Self {
        Self::StoreUnavailable { source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
