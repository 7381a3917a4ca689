//! Epoch validation and the per-epoch estimation loop shared by every
//! connectivity measure.

use crate::error::{Error, Result};
use crate::kernel::{ExecInvariantViolation, ReadEpochs};

/// Borrowed `(signal 1, signal 2)` samples of one epoch.
pub(crate) type EpochPair<'a> = (&'a [f64], &'a [f64]);

/// Check the epoch counts and lengths of both inputs and borrow the first
/// `num_epochs` pairs.
///
/// Sample values are not inspected here; non-finite data is the estimator's
/// concern and is reported per epoch.
pub(crate) fn collect_pairs<'a, D1, D2>(
    data1: &'a D1,
    data2: &'a D2,
    num_epochs: usize,
    nperseg: usize,
) -> Result<Vec<EpochPair<'a>>>
where
    D1: ReadEpochs<f64> + ?Sized,
    D2: ReadEpochs<f64> + ?Sized,
{
    if num_epochs == 0 {
        return Err(Error::invalid("num_epochs", "num_epochs must be >= 1"));
    }
    for (arg, available) in [("data1", data1.epoch_count()), ("data2", data2.epoch_count())] {
        if available < num_epochs {
            return Err(Error::invalid(
                arg,
                format!("holds {available} epochs, {num_epochs} requested"),
            ));
        }
    }

    let mut pairs = Vec::with_capacity(num_epochs);
    let mut epoch_len = None;
    for epoch in 0..num_epochs {
        let x = data1.read_epoch(epoch)?;
        let y = data2.read_epoch(epoch)?;
        let expected = *epoch_len.get_or_insert(x.len());
        for (arg, got) in [("data1", x.len()), ("data2", y.len())] {
            if got != expected {
                return Err(Error::invalid(
                    arg,
                    format!("epoch {epoch} has {got} samples, expected {expected}"),
                ));
            }
        }
        pairs.push((x, y));
    }

    let epoch_len = epoch_len.unwrap_or_default();
    if epoch_len == 0 {
        return Err(Error::invalid("data1", "epochs must be non-empty"));
    }
    if nperseg > epoch_len {
        return Err(Error::invalid(
            "nperseg",
            format!("nperseg = {nperseg} exceeds epoch length {epoch_len}"),
        ));
    }
    Ok(pairs)
}

/// Estimate every epoch pair and fold the estimates in epoch order.
///
/// With the `parallel` feature the estimates are computed on the rayon pool
/// and folded afterwards, so the fold order and the result do not depend on
/// scheduling. The first failing epoch in index order is reported.
pub(crate) fn fold_epochs<T, E, F>(pairs: &[EpochPair<'_>], estimate: E, mut fold: F) -> Result<()>
where
    T: Send,
    E: Fn(&[f64], &[f64]) -> core::result::Result<T, ExecInvariantViolation> + Sync,
    F: FnMut(T) -> core::result::Result<(), ExecInvariantViolation>,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;

        let estimates: Vec<_> = pairs.par_iter().map(|&(x, y)| estimate(x, y)).collect();
        for (epoch, estimate) in estimates.into_iter().enumerate() {
            tracing::trace!(epoch, "folding epoch");
            estimate
                .and_then(&mut fold)
                .map_err(Error::estimation(Some(epoch)))?;
        }
    }

    #[cfg(not(feature = "parallel"))]
    {
        for (epoch, &(x, y)) in pairs.iter().enumerate() {
            tracing::trace!(epoch, "estimating epoch");
            estimate(x, y)
                .and_then(&mut fold)
                .map_err(Error::estimation(Some(epoch)))?;
        }
    }

    Ok(())
}
