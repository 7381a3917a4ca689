use itertools::izip;
use rustfft::num_complex::Complex;

use super::measure::Measure;
use super::phase_lag::PhaseLagResult;
use crate::kernel::ExecInvariantViolation;

/// Running per-bin sums of a phase-lag measure across epochs.
///
/// Created per call, fed one cross spectrum per epoch in index order and
/// consumed by [`EpochAccumulator::finish`].
#[derive(Debug, Clone, PartialEq)]
pub struct EpochAccumulator {
    measure: Measure,
    numerator: Vec<f64>,
    denominator: Option<Vec<f64>>,
    epochs: usize,
}

impl EpochAccumulator {
    /// Zeroed accumulator over `bins` frequency bins.
    pub fn new(measure: Measure, bins: usize) -> Self {
        Self {
            measure,
            numerator: vec![0.0; bins],
            denominator: measure.needs_denominator().then(|| vec![0.0; bins]),
            epochs: 0,
        }
    }

    /// Measure being accumulated.
    pub fn measure(&self) -> Measure {
        self.measure
    }

    /// Number of frequency bins.
    pub fn bins(&self) -> usize {
        self.numerator.len()
    }

    /// Number of epochs folded so far.
    pub fn epochs(&self) -> usize {
        self.epochs
    }

    /// Fold one epoch's cross spectrum into the sums.
    pub fn push(&mut self, pxy: &[Complex<f64>]) -> Result<(), ExecInvariantViolation> {
        if pxy.len() != self.numerator.len() {
            return Err(ExecInvariantViolation::LengthMismatch {
                arg: "pxy",
                expected: self.numerator.len(),
                got: pxy.len(),
            });
        }
        let measure = self.measure;
        for (acc, value) in self.numerator.iter_mut().zip(pxy) {
            *acc += measure.extract(*value);
        }
        if let Some(denominator) = self.denominator.as_mut() {
            for (acc, value) in denominator.iter_mut().zip(pxy) {
                *acc += value.im.abs();
            }
        }
        self.epochs += 1;
        Ok(())
    }

    /// Average the sums over the folded epochs and finalize every bin.
    pub fn finish(self, frequencies: Vec<f64>) -> PhaseLagResult {
        let count = self.epochs.max(1) as f64;
        let numerator: Vec<f64> = self.numerator.into_iter().map(|v| v / count).collect();

        match self.denominator {
            Some(denominator) => {
                let (scores, denominator): (Vec<f64>, Vec<f64>) = izip!(&numerator, &denominator)
                    .map(|(num, den)| self.measure.finalize(*num, den / count))
                    .unzip();
                PhaseLagResult {
                    frequencies,
                    scores,
                    numerator,
                    denominator: Some(denominator),
                }
            }
            None => {
                let scores = numerator
                    .iter()
                    .map(|num| self.measure.finalize(*num, 1.0).0)
                    .collect();
                PhaseLagResult {
                    frequencies,
                    scores,
                    numerator,
                    denominator: None,
                }
            }
        }
    }
}
