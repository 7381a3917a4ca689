use core::fmt;
use core::str::FromStr;

use rustfft::num_complex::Complex;

use crate::kernel::ConfigError;
use crate::signal::spectral::neutral_denominator;

/// Phase-lag statistic accumulated across epochs.
///
/// Each measure is a policy over the per-epoch cross spectrum: what to
/// extract from every bin, whether a second running sum is needed, and how the
/// epoch means are folded into the final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum Measure {
    /// Phase Lag Index, `|mean(sign(Im Pxy))|`.
    Pli,
    /// Directed PLI, `mean(H(Im Pxy))` with `H(0) = 1`.
    Dpli,
    /// Weighted PLI, `|mean(Im Pxy)| / mean(|Im Pxy|)`.
    Wpli,
}

impl Measure {
    /// Every measure, in declaration order.
    pub const ALL: [Measure; 3] = [Measure::Pli, Measure::Dpli, Measure::Wpli];

    /// Short lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            Measure::Pli => "pli",
            Measure::Dpli => "dpli",
            Measure::Wpli => "wpli",
        }
    }

    /// Per-bin statistic added to the numerator sum.
    #[inline]
    pub fn extract(self, pxy: Complex<f64>) -> f64 {
        match self {
            Measure::Pli => sign(pxy.im),
            Measure::Dpli => heaviside(pxy.im),
            Measure::Wpli => pxy.im,
        }
    }

    /// Whether the measure keeps a denominator sum of `|Im Pxy|`.
    #[inline]
    pub fn needs_denominator(self) -> bool {
        matches!(self, Measure::Wpli)
    }

    /// Fold the epoch means of one bin into `(score, reported denominator)`.
    ///
    /// `denominator` is ignored by measures that do not keep one.
    #[inline]
    pub fn finalize(self, numerator: f64, denominator: f64) -> (f64, f64) {
        match self {
            Measure::Pli => (numerator.abs(), denominator),
            Measure::Dpli => (numerator, denominator),
            Measure::Wpli => {
                let denominator = neutral_denominator(numerator, denominator);
                (numerator.abs() / denominator, denominator)
            }
        }
    }
}

/// Three-valued sign with `sign(0) = 0`.
#[inline]
pub(crate) fn sign(value: f64) -> f64 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Heaviside step taking the value 1 at zero.
#[inline]
pub(crate) fn heaviside(value: f64) -> f64 {
    if value < 0.0 {
        0.0
    } else {
        1.0
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Measure {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pli" => Ok(Measure::Pli),
            "dpli" => Ok(Measure::Dpli),
            "wpli" => Ok(Measure::Wpli),
            _ => Err(ConfigError::InvalidArgument {
                arg: "measure",
                reason: "measure must be one of `pli`, `dpli`, `wpli`",
            }),
        }
    }
}
