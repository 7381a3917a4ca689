use thiserror::Error;

/// Validation errors raised at kernel construction or adapter binding time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required input or configuration field is empty.
    #[error("Input `{arg}` was empty.")]
    EmptyInput {
        /// Name of the argument that is empty.
        arg: &'static str,
    },
    /// A configuration argument value is invalid.
    #[error("Invalid argument `{arg}`: {reason}")]
    InvalidArgument {
        /// Name of the argument.
        arg: &'static str,
        /// Human readable reason.
        reason: &'static str,
    },
    /// A contiguous 1D slice view could not be obtained.
    #[error("Argument `{arg}` is not contiguous in memory.")]
    NonContiguous {
        /// Name of the argument that is non-contiguous.
        arg: &'static str,
    },
    /// Output/input lengths did not match required shape.
    #[error("Length mismatch on `{arg}`. Expected {expected}, got {got}.")]
    LengthMismatch {
        /// Name of the argument.
        arg: &'static str,
        /// Required length.
        expected: usize,
        /// Received length.
        got: usize,
    },
}

/// Runtime execution invariant violations for checked kernel entrypoints.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecInvariantViolation {
    /// An execution precondition was violated.
    #[error("Execution invariant violation: {reason}")]
    InvalidState {
        /// Human readable reason.
        reason: &'static str,
    },
    /// Input or output length mismatched the expected runtime shape.
    #[error("Execution length mismatch on `{arg}`. Expected {expected}, got {got}.")]
    LengthMismatch {
        /// Name of the argument.
        arg: &'static str,
        /// Required length.
        expected: usize,
        /// Received length.
        got: usize,
    },
    /// Adapter binding/configuration failure.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
