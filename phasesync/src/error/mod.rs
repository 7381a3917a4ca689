use crate::kernel::{ConfigError, ExecInvariantViolation};
use thiserror::Error;

/// Errors raised by the connectivity entrypoints.
///
/// Shape and configuration problems are always reported as
/// [`Error::InvalidInput`] before any spectrum is estimated. Failures inside
/// the spectral estimator surface as [`Error::SpectralEstimation`] together
/// with the epoch that produced them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Malformed shapes, counts or configuration values.
    #[error("Invalid input `{arg}`: {reason}")]
    InvalidInput {
        /// Name of the offending argument.
        arg: &'static str,
        /// Explaining why the argument is invalid.
        reason: String,
    },
    /// The spectral estimator rejected an epoch.
    #[error("Spectral estimation failed{}: {source}", epoch_suffix(.epoch))]
    SpectralEstimation {
        /// Index of the failing epoch, `None` for single-pair estimates.
        epoch: Option<usize>,
        /// Estimator failure.
        source: ExecInvariantViolation,
    },
}

fn epoch_suffix(epoch: &Option<usize>) -> String {
    match epoch {
        Some(idx) => format!(" on epoch {idx}"),
        None => String::new(),
    }
}

impl Error {
    pub(crate) fn invalid(arg: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidInput {
            arg,
            reason: reason.into(),
        }
    }

    pub(crate) fn estimation(epoch: Option<usize>) -> impl FnOnce(ExecInvariantViolation) -> Self {
        move |source| Error::SpectralEstimation { epoch, source }
    }
}

impl From<ConfigError> for Error {
    fn from(value: ConfigError) -> Self {
        match value {
            ConfigError::InvalidArgument { arg, reason } => Error::invalid(arg, reason),
            ConfigError::EmptyInput { arg } => Error::invalid(arg, "input was empty"),
            ConfigError::NonContiguous { arg } => Error::invalid(arg, "not contiguous in memory"),
            ConfigError::LengthMismatch { arg, expected, got } => {
                Error::invalid(arg, format!("expected length {expected}, got {got}"))
            }
        }
    }
}

/// Result alias for connectivity entrypoints.
pub type Result<T, E = Error> = core::result::Result<T, E>;
