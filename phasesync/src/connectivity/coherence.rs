use num_traits::Zero;
use rustfft::num_complex::Complex;

use crate::error::{Error, Result};
use crate::kernel::{ExecInvariantViolation, KernelLifecycle, ReadEpochs};
use crate::signal::spectral::{
    coherence_from_spectra, CoherenceConfig, CoherenceKernel, CoherenceResult, CrossSpectra,
};
use crate::signal::traits::Coherence1D;

use super::epochs::{collect_pairs, fold_epochs};
use super::options::CoherenceOptions;

fn kernel_for(fs: f64, (nperseg, noverlap): (usize, usize)) -> Result<CoherenceKernel> {
    Ok(CoherenceKernel::try_new(CoherenceConfig {
        fs,
        nperseg,
        noverlap,
    })?)
}

/// Magnitude-squared coherence and phase lag of one continuous signal pair.
///
/// Welch segments are `⌊fs · segment_length_seconds⌋` samples long and
/// overlap by `⌊segment_overlap_fraction · nperseg⌋`. Phase lags are positive
/// where `x` leads `y`, which makes them the negation of
/// `np.angle(scipy.signal.csd(x, y))`.
pub fn coherence(x: &[f64], y: &[f64], options: &CoherenceOptions) -> Result<CoherenceResult> {
    let (nperseg, noverlap) = options.segment_geometry()?;
    if y.len() != x.len() {
        return Err(Error::invalid(
            "y",
            format!("length {} differs from x length {}", y.len(), x.len()),
        ));
    }
    if x.is_empty() {
        return Err(Error::invalid("x", "signals must be non-empty"));
    }
    if nperseg > x.len() {
        return Err(Error::invalid(
            "segment_length_seconds",
            format!("segment of {nperseg} samples exceeds signal length {}", x.len()),
        ));
    }

    let kernel = kernel_for(options.fs, (nperseg, noverlap))?;
    tracing::debug!(samples = x.len(), nperseg, noverlap, "computing coherence");
    kernel.run_alloc(x, y).map_err(Error::estimation(None))
}

struct SpectraSum {
    pxy: Vec<Complex<f64>>,
    pxx: Vec<f64>,
    pyy: Vec<f64>,
    epochs: usize,
}

impl SpectraSum {
    fn new(bins: usize) -> Self {
        Self {
            pxy: vec![Complex::zero(); bins],
            pxx: vec![0.0; bins],
            pyy: vec![0.0; bins],
            epochs: 0,
        }
    }

    fn push(&mut self, spectra: CrossSpectra) -> core::result::Result<(), ExecInvariantViolation> {
        if spectra.pxy.len() != self.pxy.len() {
            return Err(ExecInvariantViolation::LengthMismatch {
                arg: "pxy",
                expected: self.pxy.len(),
                got: spectra.pxy.len(),
            });
        }
        self.pxy.iter_mut().zip(&spectra.pxy).for_each(|(acc, v)| *acc += v);
        self.pxx.iter_mut().zip(&spectra.pxx).for_each(|(acc, v)| *acc += v);
        self.pyy.iter_mut().zip(&spectra.pyy).for_each(|(acc, v)| *acc += v);
        self.epochs += 1;
        Ok(())
    }

    fn finish(mut self, frequencies: Vec<f64>) -> CoherenceResult {
        let count = self.epochs.max(1) as f64;
        self.pxy.iter_mut().for_each(|v| *v /= count);
        self.pxx.iter_mut().for_each(|v| *v /= count);
        self.pyy.iter_mut().for_each(|v| *v /= count);
        coherence_from_spectra(frequencies, &self.pxy, &self.pxx, &self.pyy)
    }
}

/// Coherence across epochs.
///
/// The complex cross spectrum and both auto spectra are averaged over the
/// first `num_epochs` epochs before the ratio is formed, so phase consistency
/// across epochs is part of the score.
pub fn coherence_epochs<D1, D2>(
    data1: &D1,
    data2: &D2,
    num_epochs: usize,
    options: &CoherenceOptions,
) -> Result<CoherenceResult>
where
    D1: ReadEpochs<f64> + ?Sized,
    D2: ReadEpochs<f64> + ?Sized,
{
    let geometry = options.segment_geometry()?;
    let pairs = collect_pairs(data1, data2, num_epochs, geometry.0)?;
    let kernel = kernel_for(options.fs, geometry)?;
    let csd = kernel.csd();
    tracing::debug!(
        epochs = num_epochs,
        nperseg = csd.nperseg(),
        noverlap = csd.noverlap(),
        "computing epoched coherence"
    );

    let mut sum = SpectraSum::new(csd.n_freq());
    fold_epochs(&pairs, |x, y| csd.cross_spectra(x, y), |s| sum.push(s))?;
    Ok(sum.finish(csd.frequencies()))
}
