//! Epoch-averaged phase-synchronization measures between two signals.
//!
//! Every measure runs the same loop: estimate the cross spectrum of each
//! epoch pair, extract a per-bin statistic, accumulate it across epochs and
//! finalize the means into a score. [`Measure`] is the policy that varies.
//!
//! | measure | per-epoch statistic | score |
//! |---|---|---|
//! | PLI | `sign(Im Pxy)` | `\|mean\|` |
//! | dPLI | `1` if `Im Pxy >= 0` else `0` | `mean` |
//! | wPLI | `Im Pxy`, `\|Im Pxy\|` | `\|mean(Im)\| / mean(\|Im\|)` |
//!
//! Cross spectra follow the `X · conj(Y)` convention, so a dPLI above 0.5
//! means the first signal leads.

mod accumulator;
mod coherence;
mod epochs;
mod measure;
mod options;
mod phase_lag;

pub use accumulator::EpochAccumulator;
pub use coherence::{coherence, coherence_epochs};
pub use measure::Measure;
pub use options::{CoherenceOptions, PhaseLagOptions};
pub use phase_lag::{compute, dpli, pli, wpli, PhaseLagConfig, PhaseLagKernel, PhaseLagResult};
