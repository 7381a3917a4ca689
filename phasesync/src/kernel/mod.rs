//! Shared trait-first kernel substrate.
//!
//! Constructor validation and the buffer adapters used by the spectral and
//! connectivity kernels. Epoched inputs are read through [`ReadEpochs`], so
//! callers can hand over nested vectors or `ndarray` matrices alike.

mod errors;
mod io;
mod lifecycle;

pub use errors::*;
pub use io::*;
pub use lifecycle::*;
