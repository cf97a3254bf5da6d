//! Error taxonomy for the harmonization pipeline.
//!
//! Only [`HarmonError::InvalidRegion`] and
//! [`HarmonError::InsufficientTemporalOverlap`] surface as hard failures
//! from the pipeline entry point. Source and resampling failures degrade
//! the result and are reported through quality metadata; cache corruption
//! is handled as a miss.

use thiserror::Error;

/// Result type alias using HarmonError.
pub type HarmonResult<T> = Result<T, HarmonError>;

/// Primary error type for harmonization operations.
#[derive(Debug, Error)]
pub enum HarmonError {
    /// Region bounds malformed or oversized; rejected before any download.
    #[error("invalid region: {0}")]
    InvalidRegion(String),

    /// A source's download or IO failed. Recovered by proceeding with the
    /// remaining sources.
    #[error("source {source_name} unavailable: {message}")]
    SourceUnavailable { source_name: String, message: String },

    /// No sources share any common time window. Fatal for the request.
    #[error("no common time window across sources: {0}")]
    InsufficientTemporalOverlap(String),

    /// A single source's reprojection failed. Recovered by dropping the
    /// source.
    #[error("resampling failed for {source_name}: {message}")]
    ResamplingFailure { source_name: String, message: String },

    /// A cache entry failed to deserialize. Treated as a miss and
    /// overwritten on the next store.
    #[error("corrupt cache entry {key}: {message}")]
    CacheCorruption { key: String, message: String },

    /// Cache IO error other than corruption.
    #[error("cache error: {0}")]
    CacheError(String),

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HarmonError {
    /// Create a SourceUnavailable error.
    pub fn source_unavailable(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            source_name: source.into(),
            message: message.into(),
        }
    }

    /// Create a ResamplingFailure error.
    pub fn resampling_failure(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ResamplingFailure {
            source_name: source.into(),
            message: message.into(),
        }
    }

    /// True if the error degrades the result instead of failing the request.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            HarmonError::SourceUnavailable { .. }
                | HarmonError::ResamplingFailure { .. }
                | HarmonError::CacheCorruption { .. }
                | HarmonError::CacheError(_)
        )
    }
}

impl From<std::io::Error> for HarmonError {
    fn from(err: std::io::Error) -> Self {
        HarmonError::CacheError(err.to_string())
    }
}

impl From<serde_json::Error> for HarmonError {
    fn from(err: serde_json::Error) -> Self {
        HarmonError::Internal(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverability() {
        assert!(HarmonError::source_unavailable("climate", "timeout").is_recoverable());
        assert!(HarmonError::resampling_failure("population", "no overlap").is_recoverable());
        assert!(!HarmonError::InvalidRegion("too big".into()).is_recoverable());
        assert!(!HarmonError::InsufficientTemporalOverlap("disjoint".into()).is_recoverable());
    }
}
