/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */
//! Common error type shared through the engine.

use banditpam_vector::ParseMetricError;
use thiserror::Error;

use crate::config::ParseAlgorithmError;

/// Convenience alias for a `Result<T, FitError>`.
pub type FitResult<T> = Result<T, FitError>;

/// Errors surfaced by configuration building and by [`crate::KMedoids::fit`].
///
/// Nothing is silently swallowed: every failure in validation, input checking,
/// or the profile log writer propagates to the fit caller through this type.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FitError {
    /// The requested algorithm name is not recognized.
    #[error("unknown algorithm \"{0}\", expected one of \"banditpam\", \"naive\"")]
    UnknownAlgorithm(String),

    /// The requested metric name is not recognized.
    #[error("unknown metric \"{0}\"")]
    UnknownMetric(String),

    /// A configuration parameter failed validation.
    #[error("invalid value for {parameter}: {reason}")]
    Config {
        parameter: &'static str,
        reason: String,
    },

    /// The input matrix has no points or no dimensions.
    #[error("input matrix is empty")]
    EmptyInput,

    /// The flat input buffer does not match the declared shape.
    #[error("input of length {len} cannot hold {num_points} points of dimension {dim}")]
    ShapeMismatch {
        len: usize,
        num_points: usize,
        dim: usize,
    },

    /// The profile log could not be opened or written.
    #[error("profile log: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ParseMetricError> for FitError {
    fn from(err: ParseMetricError) -> Self {
        let ParseMetricError::InvalidFormat(name) = err;
        FitError::UnknownMetric(name)
    }
}

impl From<ParseAlgorithmError> for FitError {
    fn from(err: ParseAlgorithmError) -> Self {
        let ParseAlgorithmError::InvalidFormat(name) = err;
        FitError::UnknownAlgorithm(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_error_is_send_and_sync() {
        fn assert_send_and_sync<T: Send + Sync>() {}
        assert_send_and_sync::<FitError>();
    }

    #[test]
    fn parse_errors_keep_the_offending_name() {
        let err: FitError = "euclidean".parse::<banditpam_vector::Metric>().unwrap_err().into();
        assert!(err.to_string().contains("euclidean"));

        let err: FitError = "pamplona".parse::<crate::Algorithm>().unwrap_err().into();
        assert!(err.to_string().contains("pamplona"));
    }
}
