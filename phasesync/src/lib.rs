#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod connectivity;
mod error;
pub mod kernel;
pub mod signal;

pub use connectivity::{
    coherence, coherence_epochs, compute, dpli, pli, wpli, CoherenceOptions, Measure,
    PhaseLagOptions, PhaseLagResult,
};
pub use error::{Error, Result};
pub use rustfft::num_complex::Complex;
pub use signal::detrend::Detrend;
pub use signal::spectral::{neutral_denominator, CoherenceResult, Scaling};
pub use signal::windows::Window;
