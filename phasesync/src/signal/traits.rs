//! Trait interfaces for signal-processing capabilities.
//!
//! These traits define the trait-first API shape shared by the spectral
//! kernels: `run_into` writes into caller buffers, `run_alloc` allocates.

use crate::kernel::{ExecInvariantViolation, Read1D, Write1D};
use rustfft::num_complex::Complex;

use super::spectral::CoherenceResult;

/// 1D Welch PSD capability.
pub trait WelchPsd1D {
    /// Run Welch PSD into caller-provided frequency and PSD buffers.
    fn run_into<I, OF, OP>(
        &self,
        input: &I,
        freqs: &mut OF,
        pxx: &mut OP,
    ) -> Result<(), ExecInvariantViolation>
    where
        I: Read1D<f64> + ?Sized,
        OF: Write1D<f64> + ?Sized,
        OP: Write1D<f64> + ?Sized;

    /// Run Welch PSD and allocate output vectors.
    fn run_alloc<I>(&self, input: &I) -> Result<(Vec<f64>, Vec<f64>), ExecInvariantViolation>
    where
        I: Read1D<f64> + ?Sized;
}

/// 1D cross-spectral density capability.
pub trait Csd1D {
    /// Run CSD into caller-provided frequency and complex CSD buffers.
    fn run_into<I1, I2, OF, OP>(
        &self,
        x: &I1,
        y: &I2,
        freqs: &mut OF,
        pxy: &mut OP,
    ) -> Result<(), ExecInvariantViolation>
    where
        I1: Read1D<f64> + ?Sized,
        I2: Read1D<f64> + ?Sized,
        OF: Write1D<f64> + ?Sized,
        OP: Write1D<Complex<f64>> + ?Sized;

    /// Run CSD and allocate output vectors.
    fn run_alloc<I1, I2>(
        &self,
        x: &I1,
        y: &I2,
    ) -> Result<(Vec<f64>, Vec<Complex<f64>>), ExecInvariantViolation>
    where
        I1: Read1D<f64> + ?Sized,
        I2: Read1D<f64> + ?Sized;
}

/// 1D magnitude-squared coherence capability.
pub trait Coherence1D {
    /// Run coherence into caller-provided frequency, coherence and phase buffers.
    fn run_into<I1, I2, OF, OC, OP>(
        &self,
        x: &I1,
        y: &I2,
        freqs: &mut OF,
        coherence: &mut OC,
        phase_lags: &mut OP,
    ) -> Result<(), ExecInvariantViolation>
    where
        I1: Read1D<f64> + ?Sized,
        I2: Read1D<f64> + ?Sized,
        OF: Write1D<f64> + ?Sized,
        OC: Write1D<f64> + ?Sized,
        OP: Write1D<f64> + ?Sized;

    /// Run coherence and allocate the result bundle.
    fn run_alloc<I1, I2>(&self, x: &I1, y: &I2) -> Result<CoherenceResult, ExecInvariantViolation>
    where
        I1: Read1D<f64> + ?Sized,
        I2: Read1D<f64> + ?Sized;
}
