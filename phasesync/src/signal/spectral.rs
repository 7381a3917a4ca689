//! Spectral estimators analogous to `scipy.signal.csd` and `scipy.signal.welch`.
//!
//! Every estimate splits the input into sub-segments of `nperseg` samples
//! advancing by `nperseg - noverlap`, detrends and tapers each one, and
//! mean-averages the one-sided spectra. Trailing samples that do not fill a
//! whole sub-segment are dropped.
//!
//! Cross spectra use the `X · conj(Y)` convention: a positive imaginary part
//! means `x` leads `y` at that frequency. This is the complex conjugate of
//! what `scipy.signal.csd` returns.

use core::fmt;
use core::str::FromStr;
use std::sync::Arc;

use itertools::izip;
use num_traits::Zero;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::error::{Error, Result};
use crate::kernel::{ConfigError, ExecInvariantViolation, KernelLifecycle, Read1D, Write1D};
use crate::signal::detrend::Detrend;
use crate::signal::traits::{Coherence1D, Csd1D, WelchPsd1D};
use crate::signal::windows::Window;

/// Normalization applied to spectral estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum Scaling {
    /// Power spectrum in V², scaled by `1 / (Σw)²`.
    Spectrum,
    /// Power spectral density in V²/Hz, scaled by `1 / (fs · Σw²)`.
    #[default]
    Density,
}

impl Scaling {
    /// scipy name of the scaling mode.
    pub fn name(self) -> &'static str {
        match self {
            Scaling::Spectrum => "spectrum",
            Scaling::Density => "density",
        }
    }
}

impl fmt::Display for Scaling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scaling {
    type Err = ConfigError;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spectrum" => Ok(Scaling::Spectrum),
            "density" => Ok(Scaling::Density),
            _ => Err(ConfigError::InvalidArgument {
                arg: "scaling",
                reason: "scaling must be `spectrum` or `density`",
            }),
        }
    }
}

/// Auto- and cross-spectra of one signal pair over a shared frequency axis.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CrossSpectra {
    /// One-sided frequency bins.
    pub frequencies: Vec<f64>,
    /// Cross-spectral density `X · conj(Y)`.
    pub pxy: Vec<Complex<f64>>,
    /// Power spectral density of `x`.
    pub pxx: Vec<f64>,
    /// Power spectral density of `y`.
    pub pyy: Vec<f64>,
}

/// Coherence result bundle.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CoherenceResult {
    /// One-sided frequency bins.
    pub frequencies: Vec<f64>,
    /// Magnitude-squared coherence in `[0, 1]`.
    pub coherence: Vec<f64>,
    /// Phase of the cross spectrum in radians, in `(-π, π]`.
    pub phase_lags: Vec<f64>,
}

/// Denominator to divide by when a ratio may degenerate.
///
/// Returns `1` wherever the numerator or the denominator is exactly zero, so
/// the ratio becomes a well-defined `0` instead of NaN or infinity. Applied
/// bin by bin.
#[inline]
pub fn neutral_denominator(numerator: f64, denominator: f64) -> f64 {
    if numerator == 0.0 || denominator == 0.0 {
        1.0
    } else {
        denominator
    }
}

/// Map an angle from `atan2` into `(-π, π]`.
#[inline]
pub(crate) fn wrap_phase(phase: f64) -> f64 {
    if phase <= -core::f64::consts::PI {
        core::f64::consts::PI
    } else {
        phase
    }
}

pub(crate) fn coherence_from_spectra(
    frequencies: Vec<f64>,
    pxy: &[Complex<f64>],
    pxx: &[f64],
    pyy: &[f64],
) -> CoherenceResult {
    let (coherence, phase_lags) = izip!(pxy, pxx, pyy)
        .map(|(pxy, pxx, pyy)| {
            let power = pxy.norm_sqr();
            let coh = power / neutral_denominator(power, pxx * pyy);
            (coh.clamp(0.0, 1.0), wrap_phase(pxy.arg()))
        })
        .unzip();
    CoherenceResult {
        frequencies,
        coherence,
        phase_lags,
    }
}

fn onesided_freqs(nfft: usize, fs: f64) -> Vec<f64> {
    let n_freq = nfft / 2 + 1;
    (0..n_freq).map(|k| k as f64 * fs / nfft as f64).collect()
}

fn segment_starts(len: usize, nperseg: usize, noverlap: usize) -> Vec<usize> {
    if nperseg == 0 || noverlap >= nperseg || len < nperseg {
        return Vec::new();
    }
    let hop = nperseg - noverlap;
    (0..=len - nperseg).step_by(hop).collect()
}

/// Constructor config for [`CsdKernel`] and [`WelchKernel`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpectralConfig {
    /// Sampling frequency in Hz.
    pub fs: f64,
    /// Sub-segment length.
    pub nperseg: usize,
    /// Samples shared by consecutive sub-segments.
    pub noverlap: usize,
    /// Taper applied to each sub-segment.
    pub window: Window,
    /// Trend removed from each sub-segment before tapering.
    pub detrend: Detrend,
    /// Output normalization.
    pub scaling: Scaling,
}

/// Largest `nperseg` whose complex FFT buffer fits in an allocation.
const MAX_NPERSEG: usize = isize::MAX as usize / core::mem::size_of::<Complex<f64>>();

impl SpectralConfig {
    /// Check the scalar settings without generating the taper or planning
    /// the FFT.
    pub fn validate(&self) -> core::result::Result<(), ConfigError> {
        if !self.fs.is_finite() || self.fs <= 0.0 {
            return Err(ConfigError::InvalidArgument {
                arg: "fs",
                reason: "fs must be finite and > 0",
            });
        }
        if self.nperseg == 0 {
            return Err(ConfigError::InvalidArgument {
                arg: "nperseg",
                reason: "nperseg must be > 0",
            });
        }
        if self.nperseg > MAX_NPERSEG {
            return Err(ConfigError::InvalidArgument {
                arg: "nperseg",
                reason: "nperseg is too large to allocate",
            });
        }
        if self.noverlap >= self.nperseg {
            return Err(ConfigError::InvalidArgument {
                arg: "noverlap",
                reason: "noverlap must be < nperseg",
            });
        }
        Ok(())
    }

    /// Reject inputs shorter than one segment before any kernel is built.
    pub(crate) fn check_fits(&self, arg: &'static str, len: usize) -> Result<()> {
        if self.nperseg > len {
            return Err(Error::invalid(
                "nperseg",
                format!("nperseg = {} exceeds {arg} length {len}", self.nperseg),
            ));
        }
        Ok(())
    }
}

struct Workspace {
    samples: Vec<f64>,
    x: Vec<Complex<f64>>,
    y: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
}

/// Trait-first cross-spectral density kernel.
///
/// Holds the generated taper and the planned FFT so that repeated calls over
/// many epochs reuse them.
#[derive(Clone)]
pub struct CsdKernel {
    fs: f64,
    nperseg: usize,
    noverlap: usize,
    window: Window,
    detrend: Detrend,
    scaling: Scaling,
    taper: Vec<f64>,
    scale: f64,
    fft: Arc<dyn Fft<f64>>,
}

impl fmt::Debug for CsdKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsdKernel")
            .field("fs", &self.fs)
            .field("nperseg", &self.nperseg)
            .field("noverlap", &self.noverlap)
            .field("window", &self.window)
            .field("detrend", &self.detrend)
            .field("scaling", &self.scaling)
            .finish_non_exhaustive()
    }
}

impl KernelLifecycle for CsdKernel {
    type Config = SpectralConfig;

    fn try_new(config: Self::Config) -> core::result::Result<Self, ConfigError> {
        config.validate()?;

        let taper: Vec<f64> = config.window.generate(config.nperseg, true);
        let scale = match config.scaling {
            Scaling::Density => {
                let energy = taper.iter().map(|w| w * w).sum::<f64>();
                1.0 / (config.fs * energy)
            }
            Scaling::Spectrum => {
                let gain = taper.iter().sum::<f64>();
                1.0 / (gain * gain)
            }
        };
        if !scale.is_finite() {
            return Err(ConfigError::InvalidArgument {
                arg: "window",
                reason: "window has no energy at this length",
            });
        }

        let fft = FftPlanner::<f64>::new().plan_fft_forward(config.nperseg);
        Ok(Self {
            fs: config.fs,
            nperseg: config.nperseg,
            noverlap: config.noverlap,
            window: config.window,
            detrend: config.detrend,
            scaling: config.scaling,
            taper,
            scale,
            fft,
        })
    }
}

impl CsdKernel {
    /// Sampling frequency in Hz.
    pub fn fs(&self) -> f64 {
        self.fs
    }

    /// Sub-segment length.
    pub fn nperseg(&self) -> usize {
        self.nperseg
    }

    /// Sub-segment overlap.
    pub fn noverlap(&self) -> usize {
        self.noverlap
    }

    /// Config this kernel was built from.
    pub fn config(&self) -> SpectralConfig {
        SpectralConfig {
            fs: self.fs,
            nperseg: self.nperseg,
            noverlap: self.noverlap,
            window: self.window,
            detrend: self.detrend,
            scaling: self.scaling,
        }
    }

    /// Number of one-sided frequency bins produced per estimate.
    pub fn n_freq(&self) -> usize {
        self.nperseg / 2 + 1
    }

    /// One-sided frequency axis shared by every estimate of this kernel.
    pub fn frequencies(&self) -> Vec<f64> {
        onesided_freqs(self.nperseg, self.fs)
    }

    /// Estimate `Pxy`, `Pxx` and `Pyy` from a single pass over the sub-segments.
    pub fn cross_spectra(
        &self,
        x: &[f64],
        y: &[f64],
    ) -> core::result::Result<CrossSpectra, ExecInvariantViolation> {
        self.validate_pair(x, y)?;
        let n_freq = self.n_freq();
        let mut pxy = vec![Complex::zero(); n_freq];
        let mut pxx = vec![0.0; n_freq];
        let mut pyy = vec![0.0; n_freq];
        let count = self.for_each_segment(x, Some(y), |k, xs, ys| {
            let factor = self.onesided_factor(k);
            pxy[k] += xs * ys.conj() * factor;
            pxx[k] += xs.norm_sqr() * factor;
            pyy[k] += ys.norm_sqr() * factor;
        });
        pxy.iter_mut().for_each(|v| *v /= count);
        pxx.iter_mut().for_each(|v| *v /= count);
        pyy.iter_mut().for_each(|v| *v /= count);
        Ok(CrossSpectra {
            frequencies: self.frequencies(),
            pxy,
            pxx,
            pyy,
        })
    }

    /// Estimate `Pxy` alone, without allocating the frequency axis.
    pub fn cross_spectrum(
        &self,
        x: &[f64],
        y: &[f64],
    ) -> core::result::Result<Vec<Complex<f64>>, ExecInvariantViolation> {
        self.validate_pair(x, y)?;
        Ok(self.csd_impl(x, y))
    }

    fn csd_impl(&self, x: &[f64], y: &[f64]) -> Vec<Complex<f64>> {
        let mut pxy = vec![Complex::zero(); self.n_freq()];
        let count = self.for_each_segment(x, Some(y), |k, xs, ys| {
            pxy[k] += xs * ys.conj() * self.onesided_factor(k);
        });
        pxy.iter_mut().for_each(|v| *v /= count);
        pxy
    }

    fn psd_impl(&self, x: &[f64]) -> Vec<f64> {
        let mut pxx = vec![0.0; self.n_freq()];
        let count = self.for_each_segment(x, None, |k, xs, _| {
            pxx[k] += xs.norm_sqr() * self.onesided_factor(k);
        });
        pxx.iter_mut().for_each(|v| *v /= count);
        pxx
    }

    fn onesided_factor(&self, k: usize) -> f64 {
        let nyquist = self.nperseg % 2 == 0 && k == self.nperseg / 2;
        if k == 0 || nyquist {
            self.scale
        } else {
            2.0 * self.scale
        }
    }

    /// Transform every sub-segment of `x` (and `y`) and hand each one-sided
    /// bin to `visit`. Returns the number of sub-segments as the averaging
    /// divisor. When `y` is absent `visit` receives the `x` bin twice.
    fn for_each_segment<V>(&self, x: &[f64], y: Option<&[f64]>, mut visit: V) -> f64
    where
        V: FnMut(usize, Complex<f64>, Complex<f64>),
    {
        let starts = segment_starts(x.len(), self.nperseg, self.noverlap);
        let mut ws = Workspace {
            samples: vec![0.0; self.nperseg],
            x: vec![Complex::zero(); self.nperseg],
            y: vec![Complex::zero(); self.nperseg],
            scratch: vec![Complex::zero(); self.fft.get_inplace_scratch_len()],
        };
        let n_freq = self.n_freq();

        for &start in &starts {
            let end = start + self.nperseg;
            self.transform(&x[start..end], &mut ws.samples, &mut ws.x, &mut ws.scratch);
            match y {
                Some(y) => {
                    self.transform(&y[start..end], &mut ws.samples, &mut ws.y, &mut ws.scratch);
                    for k in 0..n_freq {
                        visit(k, ws.x[k], ws.y[k]);
                    }
                }
                None => {
                    for k in 0..n_freq {
                        visit(k, ws.x[k], ws.x[k]);
                    }
                }
            }
        }
        starts.len().max(1) as f64
    }

    fn transform(
        &self,
        segment: &[f64],
        samples: &mut [f64],
        out: &mut [Complex<f64>],
        scratch: &mut [Complex<f64>],
    ) {
        samples.copy_from_slice(segment);
        self.detrend.apply(samples);
        for ((dst, s), w) in out.iter_mut().zip(samples.iter()).zip(self.taper.iter()) {
            *dst = Complex::new(s * w, 0.0);
        }
        self.fft.process_with_scratch(out, scratch);
    }

    fn validate_input(&self, input: &[f64]) -> core::result::Result<(), ExecInvariantViolation> {
        if input.is_empty() {
            return Err(ExecInvariantViolation::InvalidState {
                reason: "spectral input must be non-empty",
            });
        }
        if input.len() < self.nperseg {
            return Err(ExecInvariantViolation::InvalidState {
                reason: "nperseg exceeds input length",
            });
        }
        if input.iter().any(|v| !v.is_finite()) {
            return Err(ExecInvariantViolation::InvalidState {
                reason: "non-finite sample in spectral input",
            });
        }
        Ok(())
    }

    fn validate_pair(&self, x: &[f64], y: &[f64]) -> core::result::Result<(), ExecInvariantViolation> {
        if y.len() != x.len() {
            return Err(ExecInvariantViolation::LengthMismatch {
                arg: "y",
                expected: x.len(),
                got: y.len(),
            });
        }
        self.validate_input(x)?;
        self.validate_input(y)
    }
}

fn check_output_len(
    arg: &'static str,
    expected: usize,
    got: usize,
) -> core::result::Result<(), ExecInvariantViolation> {
    if expected != got {
        return Err(ExecInvariantViolation::LengthMismatch { arg, expected, got });
    }
    Ok(())
}

impl Csd1D for CsdKernel {
    fn run_into<I1, I2, OF, OP>(
        &self,
        x: &I1,
        y: &I2,
        freqs: &mut OF,
        pxy: &mut OP,
    ) -> core::result::Result<(), ExecInvariantViolation>
    where
        I1: Read1D<f64> + ?Sized,
        I2: Read1D<f64> + ?Sized,
        OF: Write1D<f64> + ?Sized,
        OP: Write1D<Complex<f64>> + ?Sized,
    {
        let x = x.read_slice().map_err(ExecInvariantViolation::from)?;
        let y = y.read_slice().map_err(ExecInvariantViolation::from)?;
        self.validate_pair(x, y)?;

        let expected = self.n_freq();
        let f_out = freqs
            .write_slice_mut()
            .map_err(ExecInvariantViolation::from)?;
        check_output_len("freqs", expected, f_out.len())?;
        let p_out = pxy
            .write_slice_mut()
            .map_err(ExecInvariantViolation::from)?;
        check_output_len("pxy", expected, p_out.len())?;

        f_out.copy_from_slice(&self.frequencies());
        p_out.copy_from_slice(&self.csd_impl(x, y));
        Ok(())
    }

    fn run_alloc<I1, I2>(
        &self,
        x: &I1,
        y: &I2,
    ) -> core::result::Result<(Vec<f64>, Vec<Complex<f64>>), ExecInvariantViolation>
    where
        I1: Read1D<f64> + ?Sized,
        I2: Read1D<f64> + ?Sized,
    {
        let x = x.read_slice().map_err(ExecInvariantViolation::from)?;
        let y = y.read_slice().map_err(ExecInvariantViolation::from)?;
        self.validate_pair(x, y)?;
        Ok((self.frequencies(), self.csd_impl(x, y)))
    }
}

/// Trait-first Welch PSD kernel.
#[derive(Debug, Clone)]
pub struct WelchKernel {
    inner: CsdKernel,
}

impl KernelLifecycle for WelchKernel {
    type Config = SpectralConfig;

    fn try_new(config: Self::Config) -> core::result::Result<Self, ConfigError> {
        Ok(Self {
            inner: CsdKernel::try_new(config)?,
        })
    }
}

impl WelchPsd1D for WelchKernel {
    fn run_into<I, OF, OP>(
        &self,
        input: &I,
        freqs: &mut OF,
        pxx: &mut OP,
    ) -> core::result::Result<(), ExecInvariantViolation>
    where
        I: Read1D<f64> + ?Sized,
        OF: Write1D<f64> + ?Sized,
        OP: Write1D<f64> + ?Sized,
    {
        let input = input.read_slice().map_err(ExecInvariantViolation::from)?;
        self.inner.validate_input(input)?;

        let expected = self.inner.n_freq();
        let f_out = freqs
            .write_slice_mut()
            .map_err(ExecInvariantViolation::from)?;
        check_output_len("freqs", expected, f_out.len())?;
        let p_out = pxx
            .write_slice_mut()
            .map_err(ExecInvariantViolation::from)?;
        check_output_len("pxx", expected, p_out.len())?;

        f_out.copy_from_slice(&self.inner.frequencies());
        p_out.copy_from_slice(&self.inner.psd_impl(input));
        Ok(())
    }

    fn run_alloc<I>(&self, input: &I) -> core::result::Result<(Vec<f64>, Vec<f64>), ExecInvariantViolation>
    where
        I: Read1D<f64> + ?Sized,
    {
        let input = input.read_slice().map_err(ExecInvariantViolation::from)?;
        self.inner.validate_input(input)?;
        Ok((self.inner.frequencies(), self.inner.psd_impl(input)))
    }
}

/// Constructor config for [`CoherenceKernel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoherenceConfig {
    /// Sampling frequency in Hz.
    pub fs: f64,
    /// Segment length.
    pub nperseg: usize,
    /// Overlap length.
    pub noverlap: usize,
}

/// Trait-first coherence kernel using Welch defaults: Hann taper, constant
/// detrend, density scaling.
#[derive(Debug, Clone)]
pub struct CoherenceKernel {
    csd: CsdKernel,
}

impl CoherenceKernel {
    /// Underlying cross-spectral estimator.
    pub fn csd(&self) -> &CsdKernel {
        &self.csd
    }
}

impl KernelLifecycle for CoherenceKernel {
    type Config = CoherenceConfig;

    fn try_new(config: Self::Config) -> core::result::Result<Self, ConfigError> {
        let csd = CsdKernel::try_new(SpectralConfig {
            fs: config.fs,
            nperseg: config.nperseg,
            noverlap: config.noverlap,
            window: Window::Hann,
            detrend: Detrend::Constant,
            scaling: Scaling::Density,
        })?;
        Ok(Self { csd })
    }
}

impl Coherence1D for CoherenceKernel {
    fn run_into<I1, I2, OF, OC, OP>(
        &self,
        x: &I1,
        y: &I2,
        freqs: &mut OF,
        coherence: &mut OC,
        phase_lags: &mut OP,
    ) -> core::result::Result<(), ExecInvariantViolation>
    where
        I1: Read1D<f64> + ?Sized,
        I2: Read1D<f64> + ?Sized,
        OF: Write1D<f64> + ?Sized,
        OC: Write1D<f64> + ?Sized,
        OP: Write1D<f64> + ?Sized,
    {
        let x = x.read_slice().map_err(ExecInvariantViolation::from)?;
        let y = y.read_slice().map_err(ExecInvariantViolation::from)?;
        self.csd.validate_pair(x, y)?;

        let expected = self.csd.n_freq();
        let f_out = freqs
            .write_slice_mut()
            .map_err(ExecInvariantViolation::from)?;
        check_output_len("freqs", expected, f_out.len())?;
        let c_out = coherence
            .write_slice_mut()
            .map_err(ExecInvariantViolation::from)?;
        check_output_len("coherence", expected, c_out.len())?;
        let p_out = phase_lags
            .write_slice_mut()
            .map_err(ExecInvariantViolation::from)?;
        check_output_len("phase_lags", expected, p_out.len())?;

        let result = self.run_alloc(x, y)?;
        f_out.copy_from_slice(&result.frequencies);
        c_out.copy_from_slice(&result.coherence);
        p_out.copy_from_slice(&result.phase_lags);
        Ok(())
    }

    fn run_alloc<I1, I2>(
        &self,
        x: &I1,
        y: &I2,
    ) -> core::result::Result<CoherenceResult, ExecInvariantViolation>
    where
        I1: Read1D<f64> + ?Sized,
        I2: Read1D<f64> + ?Sized,
    {
        let x = x.read_slice().map_err(ExecInvariantViolation::from)?;
        let y = y.read_slice().map_err(ExecInvariantViolation::from)?;
        let spectra = self.csd.cross_spectra(x, y)?;
        Ok(coherence_from_spectra(
            spectra.frequencies,
            &spectra.pxy,
            &spectra.pxx,
            &spectra.pyy,
        ))
    }
}

/// Estimate the cross-spectral density of `x` and `y`.
pub fn csd(x: &[f64], y: &[f64], config: SpectralConfig) -> Result<(Vec<f64>, Vec<Complex<f64>>)> {
    config.validate()?;
    config.check_fits("x", x.len())?;
    let kernel = CsdKernel::try_new(config)?;
    kernel.run_alloc(x, y).map_err(Error::estimation(None))
}

/// Estimate the power spectral density of `x` with Welch's method.
pub fn welch(x: &[f64], config: SpectralConfig) -> Result<(Vec<f64>, Vec<f64>)> {
    config.validate()?;
    config.check_fits("x", x.len())?;
    let kernel = WelchKernel::try_new(config)?;
    kernel.run_alloc(x).map_err(Error::estimation(None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use core::f64::consts::PI;

    fn test_signal() -> Vec<f64> {
        let fs = 100.0;
        (0..512)
            .map(|i| {
                let t = i as f64 / fs;
                (2.0 * PI * 5.0 * t).sin() + 0.2 * (2.0 * PI * 12.0 * t).sin()
            })
            .collect()
    }

    fn config(fs: f64, nperseg: usize) -> SpectralConfig {
        SpectralConfig {
            fs,
            nperseg,
            noverlap: nperseg / 2,
            window: Window::Hann,
            detrend: Detrend::Constant,
            scaling: Scaling::Density,
        }
    }

    fn tone(fs: f64, freq: f64, amplitude: f64, phase: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| amplitude * (2.0 * PI * freq * i as f64 / fs + phase).sin())
            .collect()
    }

    #[test]
    fn segment_starts_drop_trailing_samples() {
        assert_eq!(segment_starts(10, 4, 0), vec![0, 4]);
        assert_eq!(segment_starts(10, 4, 2), vec![0, 2, 4, 6]);
        assert_eq!(segment_starts(4, 4, 0), vec![0]);
        assert!(segment_starts(3, 4, 0).is_empty());
    }

    #[test]
    fn welch_detects_main_frequency_bin() {
        let x = test_signal();
        let (f, pxx) = welch(&x, config(100.0, 128)).expect("welch");
        let (idx, _) = pxx
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(core::cmp::Ordering::Equal))
            .expect("max bin");
        assert_abs_diff_eq!(f[idx], 5.0, epsilon = 1.0);
        assert!(pxx.iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn spectrum_scaling_reports_rms_power_of_a_bin_centred_tone() {
        let fs = 64.0;
        let x = tone(fs, 8.0, 2.0, 0.3, 64);
        let (f, pxx) = welch(
            &x,
            SpectralConfig {
                fs,
                nperseg: 64,
                noverlap: 0,
                window: Window::Boxcar,
                detrend: Detrend::None,
                scaling: Scaling::Spectrum,
            },
        )
        .expect("welch");
        assert_eq!(f.len(), 33);
        assert_abs_diff_eq!(f[8], 8.0, epsilon = 1e-12);
        assert_abs_diff_eq!(pxx[8], 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(pxx[3], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn csd_positive_imaginary_part_means_x_leads() {
        let fs = 64.0;
        let x = tone(fs, 8.0, 1.0, 0.0, 64);
        let y = tone(fs, 8.0, 1.0, -PI / 2.0, 64);
        let (_, pxy) = csd(
            &x,
            &y,
            SpectralConfig {
                fs,
                nperseg: 64,
                noverlap: 0,
                window: Window::Boxcar,
                detrend: Detrend::None,
                scaling: Scaling::Spectrum,
            },
        )
        .expect("csd");
        assert!(pxy[8].im > 0.0);
        assert_abs_diff_eq!(pxy[8].im, 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(pxy[8].re, 0.0, epsilon = 1e-9);

        let (_, pyx) = csd(
            &y,
            &x,
            SpectralConfig {
                fs,
                nperseg: 64,
                noverlap: 0,
                window: Window::Boxcar,
                detrend: Detrend::None,
                scaling: Scaling::Spectrum,
            },
        )
        .expect("csd");
        assert_eq!(pyx[8].im, -pxy[8].im);
    }

    #[test]
    fn csd_of_a_signal_with_itself_is_real() {
        let x = test_signal();
        let (fxy, pxy) = csd(&x, &x, config(100.0, 128)).expect("csd");
        let (fxx, pxx) = welch(&x, config(100.0, 128)).expect("welch");
        assert_eq!(fxy, fxx);
        for (c, p) in pxy.iter().zip(pxx.iter()) {
            assert_eq!(c.im, 0.0);
            assert_abs_diff_eq!(c.re, *p, epsilon = 1e-12);
        }
    }

    #[test]
    fn cross_spectra_agree_with_individual_estimates() {
        let x = test_signal();
        let y: Vec<f64> = x.iter().rev().copied().collect();
        let kernel = CsdKernel::try_new(config(100.0, 128)).expect("valid config");
        let spectra = kernel.cross_spectra(&x, &y).expect("cross spectra");
        let (_, pxy) = kernel.run_alloc(&x, &y).expect("csd");
        let (_, pyy) = welch(&y, config(100.0, 128)).expect("welch");
        assert_eq!(spectra.frequencies.len(), 65);
        for k in 0..65 {
            assert_abs_diff_eq!(spectra.pxy[k].re, pxy[k].re, epsilon = 1e-12);
            assert_abs_diff_eq!(spectra.pxy[k].im, pxy[k].im, epsilon = 1e-12);
            assert_abs_diff_eq!(spectra.pyy[k], pyy[k], epsilon = 1e-12);
        }
    }

    #[test]
    fn csd_kernel_contracts_validate_config() {
        let mut bad = config(100.0, 128);
        bad.noverlap = 128;
        assert_eq!(
            CsdKernel::try_new(bad).expect_err("noverlap >= nperseg"),
            ConfigError::InvalidArgument {
                arg: "noverlap",
                reason: "noverlap must be < nperseg",
            }
        );
        assert!(CsdKernel::try_new(config(0.0, 128)).is_err());
        assert!(CsdKernel::try_new(config(f64::NAN, 128)).is_err());
        assert!(WelchKernel::try_new(config(100.0, 0)).is_err());
    }

    #[test]
    fn csd_kernel_contracts_validate_output_shape() {
        let kernel = CsdKernel::try_new(config(100.0, 128)).expect("valid config");
        let x = test_signal();
        let y = test_signal();
        let expected = 65;
        let mut f = vec![0.0; expected];
        let mut p = vec![Complex::new(0.0, 0.0); expected - 1];
        let err = kernel
            .run_into(&x, &y, &mut f, &mut p)
            .expect_err("mismatched output length should error");
        assert!(matches!(err, ExecInvariantViolation::LengthMismatch { .. }));

        let mut p = vec![Complex::new(0.0, 0.0); expected];
        kernel
            .run_into(&x, &y, &mut f, &mut p)
            .expect("matching buffers");
        assert_abs_diff_eq!(f[64], 50.0, epsilon = 1e-12);
    }

    #[test]
    fn csd_kernel_rejects_bad_inputs() {
        let kernel = CsdKernel::try_new(config(100.0, 128)).expect("valid config");
        let x = test_signal();

        let err = kernel.run_alloc(&x, &x[..100]).expect_err("length mismatch");
        assert_eq!(
            err,
            ExecInvariantViolation::LengthMismatch {
                arg: "y",
                expected: 512,
                got: 100,
            }
        );

        let short = &x[..64];
        assert_eq!(
            kernel.run_alloc(short, short).expect_err("too short"),
            ExecInvariantViolation::InvalidState {
                reason: "nperseg exceeds input length",
            }
        );

        let mut poisoned = x.clone();
        poisoned[200] = f64::NAN;
        assert_eq!(
            kernel.run_alloc(&x, &poisoned).expect_err("nan input"),
            ExecInvariantViolation::InvalidState {
                reason: "non-finite sample in spectral input",
            }
        );

        let empty: [f64; 0] = [];
        assert!(kernel.run_alloc(&empty, &empty).is_err());
    }

    #[test]
    fn oversized_nperseg_is_rejected_without_allocating() {
        let x = test_signal();
        for nperseg in [1 << 61, usize::MAX] {
            let huge = SpectralConfig {
                nperseg,
                ..config(100.0, 128)
            };
            assert_eq!(
                CsdKernel::try_new(huge).expect_err("unallocatable nperseg"),
                ConfigError::InvalidArgument {
                    arg: "nperseg",
                    reason: "nperseg is too large to allocate",
                }
            );
            assert!(matches!(
                csd(&x, &x, huge).expect_err("csd"),
                Error::InvalidInput { arg: "nperseg", .. }
            ));
        }

        let long = config(100.0, 1_000_000_000);
        assert!(long.validate().is_ok());
        assert!(matches!(
            welch(&x, long).expect_err("welch"),
            Error::InvalidInput { arg: "nperseg", .. }
        ));
    }

    #[test]
    fn welch_kernel_contracts_validate_output_shape() {
        let kernel = WelchKernel::try_new(config(100.0, 128)).expect("valid config");
        let x = test_signal();
        let mut f = vec![0.0; 64];
        let mut p = vec![0.0; 65];
        let err = kernel
            .run_into(&x, &mut f, &mut p)
            .expect_err("mismatched output length should error");
        assert!(matches!(
            err,
            ExecInvariantViolation::LengthMismatch { arg: "freqs", .. }
        ));
    }

    #[test]
    fn coherence_of_identical_signals_is_one_with_zero_phase() {
        let x = test_signal();
        let kernel = CoherenceKernel::try_new(CoherenceConfig {
            fs: 100.0,
            nperseg: 128,
            noverlap: 64,
        })
        .expect("valid config");
        let result = kernel.run_alloc(&x, &x).expect("coherence");
        assert_eq!(result.frequencies.len(), 65);
        let k5 = 5 * 128 / 100 + 1;
        assert_abs_diff_eq!(result.coherence[k5], 1.0, epsilon = 1e-9);
        assert!(result.coherence.iter().all(|c| (0.0..=1.0).contains(c)));
        assert!(result.phase_lags.iter().all(|p| *p == 0.0));
    }

    #[test]
    fn coherence_kernel_contracts_validate_output_shape() {
        let kernel = CoherenceKernel::try_new(CoherenceConfig {
            fs: 100.0,
            nperseg: 128,
            noverlap: 64,
        })
        .expect("valid config");
        let x = test_signal();
        let y = test_signal();
        let expected = 65;
        let mut f = vec![0.0; expected];
        let mut c = vec![0.0; expected];
        let mut p = vec![0.0; expected - 1];
        let err = kernel
            .run_into(&x, &y, &mut f, &mut c, &mut p)
            .expect_err("mismatched output length should error");
        assert!(matches!(
            err,
            ExecInvariantViolation::LengthMismatch {
                arg: "phase_lags",
                ..
            }
        ));
    }

    #[test]
    fn neutral_denominator_only_replaces_degenerate_bins() {
        assert_eq!(neutral_denominator(0.0, 0.0), 1.0);
        assert_eq!(neutral_denominator(0.0, 3.0), 1.0);
        assert_eq!(neutral_denominator(2.0, 0.0), 1.0);
        assert_eq!(neutral_denominator(2.0, 4.0), 4.0);
    }

    #[test]
    fn phase_wrapping_excludes_minus_pi() {
        assert_eq!(wrap_phase(-PI), PI);
        assert_eq!(wrap_phase(PI), PI);
        assert_eq!(wrap_phase(-1.0), -1.0);
        let result = coherence_from_spectra(
            vec![0.0],
            &[Complex::new(-1.0, -0.0)],
            &[1.0],
            &[1.0],
        );
        assert_eq!(result.phase_lags, vec![PI]);
        assert_eq!(result.coherence, vec![1.0]);
    }

    #[test]
    fn scaling_names_parse() {
        assert_eq!("spectrum".parse::<Scaling>(), Ok(Scaling::Spectrum));
        assert_eq!("DENSITY".parse::<Scaling>(), Ok(Scaling::Density));
        assert!("magnitude".parse::<Scaling>().is_err());
        assert_eq!(Scaling::Spectrum.to_string(), "spectrum");
    }
}
