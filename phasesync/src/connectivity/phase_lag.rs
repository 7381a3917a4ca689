use crate::error::Result;
use crate::kernel::{ConfigError, KernelLifecycle, ReadEpochs};
use crate::signal::spectral::CsdKernel;

use super::accumulator::EpochAccumulator;
use super::epochs::{collect_pairs, fold_epochs, EpochPair};
use super::measure::Measure;
use super::options::PhaseLagOptions;

/// Epoch-averaged phase-lag scores over a one-sided frequency axis.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PhaseLagResult {
    /// Frequency of every bin in Hz.
    pub frequencies: Vec<f64>,
    /// Final score per bin, in `[0, 1]`.
    pub scores: Vec<f64>,
    /// Epoch mean of the extracted statistic, before finalization.
    pub numerator: Vec<f64>,
    /// Epoch mean of `|Im Pxy|` for wPLI, with degenerate bins set to 1.
    pub denominator: Option<Vec<f64>>,
}

impl PhaseLagResult {
    /// Number of frequency bins.
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    /// Whether the result holds no bins.
    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// Index of the bin closest to `frequency`.
    pub fn nearest_bin(&self, frequency: f64) -> Option<usize> {
        if !frequency.is_finite() {
            return None;
        }
        self.frequencies
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| (*a - frequency).abs().total_cmp(&(*b - frequency).abs()))
            .map(|(idx, _)| idx)
    }

    /// Score of the bin closest to `frequency`.
    pub fn score_at(&self, frequency: f64) -> Option<f64> {
        self.nearest_bin(frequency)
            .and_then(|idx| self.scores.get(idx).copied())
    }
}

/// Constructor config for [`PhaseLagKernel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseLagConfig {
    /// Statistic to accumulate.
    pub measure: Measure,
    /// Spectral settings.
    pub options: PhaseLagOptions,
}

/// Trait-first phase-lag connectivity kernel.
///
/// Construction validates the spectral settings once; [`PhaseLagKernel::run`]
/// then only checks the epoch shapes it is handed.
#[derive(Debug, Clone)]
pub struct PhaseLagKernel {
    measure: Measure,
    csd: CsdKernel,
}

impl KernelLifecycle for PhaseLagKernel {
    type Config = PhaseLagConfig;

    fn try_new(config: Self::Config) -> core::result::Result<Self, ConfigError> {
        Ok(Self {
            measure: config.measure,
            csd: CsdKernel::try_new(config.options.spectral_config())?,
        })
    }
}

impl PhaseLagKernel {
    /// Statistic this kernel accumulates.
    pub fn measure(&self) -> Measure {
        self.measure
    }

    /// Per-epoch cross-spectral estimator.
    pub fn csd(&self) -> &CsdKernel {
        &self.csd
    }

    /// Score the first `num_epochs` epochs of `data1` against `data2`.
    pub fn run<D1, D2>(&self, data1: &D1, data2: &D2, num_epochs: usize) -> Result<PhaseLagResult>
    where
        D1: ReadEpochs<f64> + ?Sized,
        D2: ReadEpochs<f64> + ?Sized,
    {
        let pairs = collect_pairs(data1, data2, num_epochs, self.csd.nperseg())?;
        self.score_pairs(&pairs)
    }

    fn score_pairs(&self, pairs: &[EpochPair<'_>]) -> Result<PhaseLagResult> {
        tracing::debug!(
            measure = %self.measure,
            epochs = pairs.len(),
            bins = self.csd.n_freq(),
            nperseg = self.csd.nperseg(),
            noverlap = self.csd.noverlap(),
            "computing phase-lag connectivity"
        );

        let mut acc = EpochAccumulator::new(self.measure, self.csd.n_freq());
        fold_epochs(
            pairs,
            |x, y| self.csd.cross_spectrum(x, y),
            |pxy| acc.push(&pxy),
        )?;

        let result = acc.finish(self.csd.frequencies());
        tracing::debug!(measure = %self.measure, bins = result.len(), "phase-lag connectivity done");
        Ok(result)
    }
}

/// Score any [`Measure`] between two epoched signals.
///
/// `data1` and `data2` are `(epochs, samples)` inputs; only the first
/// `num_epochs` epochs are used. Shape and option problems are reported as
/// [`Error::InvalidInput`](crate::Error::InvalidInput) before any spectrum is
/// estimated.
pub fn compute<D1, D2>(
    measure: Measure,
    data1: &D1,
    data2: &D2,
    num_epochs: usize,
    options: &PhaseLagOptions,
) -> Result<PhaseLagResult>
where
    D1: ReadEpochs<f64> + ?Sized,
    D2: ReadEpochs<f64> + ?Sized,
{
    let config = options.spectral_config();
    config.validate()?;
    let pairs = collect_pairs(data1, data2, num_epochs, config.nperseg)?;
    let kernel = PhaseLagKernel::try_new(PhaseLagConfig {
        measure,
        options: *options,
    })?;
    kernel.score_pairs(&pairs)
}

/// Phase Lag Index, `|mean(sign(Im Pxy))|` per bin.
pub fn pli<D1, D2>(
    data1: &D1,
    data2: &D2,
    num_epochs: usize,
    options: &PhaseLagOptions,
) -> Result<PhaseLagResult>
where
    D1: ReadEpochs<f64> + ?Sized,
    D2: ReadEpochs<f64> + ?Sized,
{
    compute(Measure::Pli, data1, data2, num_epochs, options)
}

/// Directed Phase Lag Index. Values above 0.5 mean `data1` leads.
pub fn dpli<D1, D2>(
    data1: &D1,
    data2: &D2,
    num_epochs: usize,
    options: &PhaseLagOptions,
) -> Result<PhaseLagResult>
where
    D1: ReadEpochs<f64> + ?Sized,
    D2: ReadEpochs<f64> + ?Sized,
{
    compute(Measure::Dpli, data1, data2, num_epochs, options)
}

/// Weighted Phase Lag Index. The result carries the denominator.
pub fn wpli<D1, D2>(
    data1: &D1,
    data2: &D2,
    num_epochs: usize,
    options: &PhaseLagOptions,
) -> Result<PhaseLagResult>
where
    D1: ReadEpochs<f64> + ?Sized,
    D2: ReadEpochs<f64> + ?Sized,
{
    compute(Measure::Wpli, data1, data2, num_epochs, options)
}
