use crate::error::{Error, Result};
use crate::signal::detrend::Detrend;
use crate::signal::spectral::{Scaling, SpectralConfig};
use crate::signal::windows::Window;

/// Spectral settings shared by the PLI family.
///
/// The defaults describe a 2 kHz recording cut into one-second epochs that
/// are each analysed as a single boxcar segment.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct PhaseLagOptions {
    /// Cross-spectrum normalization.
    pub scaling: Scaling,
    /// Taper applied to every sub-segment.
    pub window: Window,
    /// Sampling frequency in Hz.
    pub fs: f64,
    /// Sub-segment length in samples.
    pub nperseg: usize,
    /// Samples shared by consecutive sub-segments.
    pub noverlap: usize,
    /// Trend removed from every sub-segment.
    pub detrend: Detrend,
}

impl Default for PhaseLagOptions {
    fn default() -> Self {
        Self {
            scaling: Scaling::Spectrum,
            window: Window::Boxcar,
            fs: 2000.0,
            nperseg: 2000,
            noverlap: 0,
            detrend: Detrend::Linear,
        }
    }
}

impl PhaseLagOptions {
    /// Override the scaling.
    pub fn with_scaling(mut self, scaling: Scaling) -> Self {
        self.scaling = scaling;
        self
    }

    /// Override the window.
    pub fn with_window(mut self, window: Window) -> Self {
        self.window = window;
        self
    }

    /// Override the sampling frequency.
    pub fn with_fs(mut self, fs: f64) -> Self {
        self.fs = fs;
        self
    }

    /// Override the sub-segment length.
    pub fn with_nperseg(mut self, nperseg: usize) -> Self {
        self.nperseg = nperseg;
        self
    }

    /// Override the sub-segment overlap.
    pub fn with_noverlap(mut self, noverlap: usize) -> Self {
        self.noverlap = noverlap;
        self
    }

    /// Override the detrend mode.
    pub fn with_detrend(mut self, detrend: Detrend) -> Self {
        self.detrend = detrend;
        self
    }

    /// Estimator config described by these options.
    pub fn spectral_config(&self) -> SpectralConfig {
        SpectralConfig {
            fs: self.fs,
            nperseg: self.nperseg,
            noverlap: self.noverlap,
            window: self.window,
            detrend: self.detrend,
            scaling: self.scaling,
        }
    }
}

/// Segment geometry for coherence, expressed in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct CoherenceOptions {
    /// Sampling frequency in Hz.
    pub fs: f64,
    /// Length of each Welch segment in seconds.
    pub segment_length_seconds: f64,
    /// Fraction of a segment shared with the next one, in `[0, 1)`.
    pub segment_overlap_fraction: f64,
}

impl Default for CoherenceOptions {
    fn default() -> Self {
        Self {
            fs: 2500.0,
            segment_length_seconds: 1.0,
            segment_overlap_fraction: 0.5,
        }
    }
}

impl CoherenceOptions {
    /// Override the sampling frequency.
    pub fn with_fs(mut self, fs: f64) -> Self {
        self.fs = fs;
        self
    }

    /// Override the segment length.
    pub fn with_segment_length_seconds(mut self, seconds: f64) -> Self {
        self.segment_length_seconds = seconds;
        self
    }

    /// Override the overlap fraction.
    pub fn with_segment_overlap_fraction(mut self, fraction: f64) -> Self {
        self.segment_overlap_fraction = fraction;
        self
    }

    /// Validate and convert to `(nperseg, noverlap)` in samples.
    pub fn segment_geometry(&self) -> Result<(usize, usize)> {
        if !self.fs.is_finite() || self.fs <= 0.0 {
            return Err(Error::invalid("fs", "fs must be finite and > 0"));
        }
        if !self.segment_length_seconds.is_finite() || self.segment_length_seconds <= 0.0 {
            return Err(Error::invalid(
                "segment_length_seconds",
                "segment length must be finite and > 0",
            ));
        }
        if !(0.0..1.0).contains(&self.segment_overlap_fraction) {
            return Err(Error::invalid(
                "segment_overlap_fraction",
                "overlap fraction must lie in [0, 1)",
            ));
        }
        let nperseg = (self.fs * self.segment_length_seconds).floor() as usize;
        if nperseg == 0 {
            return Err(Error::invalid(
                "segment_length_seconds",
                "segment is shorter than one sample",
            ));
        }
        let noverlap = (self.segment_overlap_fraction * nperseg as f64).floor() as usize;
        Ok((nperseg, noverlap))
    }
}
