//! Per-segment trend removal, as applied by `scipy.signal.detrend`.

use core::fmt;
use core::str::FromStr;

use crate::kernel::ConfigError;

/// Trend removed from every spectral sub-segment before windowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum Detrend {
    /// Leave the segment untouched.
    None,
    /// Subtract the segment mean.
    Constant,
    /// Subtract the least-squares line through the segment.
    #[default]
    Linear,
}

impl Detrend {
    /// scipy name of the detrend mode.
    pub fn name(self) -> &'static str {
        match self {
            Detrend::None => "none",
            Detrend::Constant => "constant",
            Detrend::Linear => "linear",
        }
    }

    /// Remove the trend in place.
    pub fn apply(self, segment: &mut [f64]) {
        let n = segment.len();
        if n == 0 {
            return;
        }
        match self {
            Detrend::None => {}
            Detrend::Constant => {
                let mean = segment.iter().sum::<f64>() / n as f64;
                segment.iter_mut().for_each(|v| *v -= mean);
            }
            Detrend::Linear => {
                let mean = segment.iter().sum::<f64>() / n as f64;
                let t_mean = (n as f64 - 1.0) / 2.0;
                let (sxy, sxx) = segment.iter().enumerate().fold((0.0, 0.0), |(sxy, sxx), (i, v)| {
                    let dt = i as f64 - t_mean;
                    (sxy + dt * (v - mean), sxx + dt * dt)
                });
                let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
                segment
                    .iter_mut()
                    .enumerate()
                    .for_each(|(i, v)| *v -= mean + slope * (i as f64 - t_mean));
            }
        }
    }
}

impl fmt::Display for Detrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Detrend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "false" => Ok(Detrend::None),
            "constant" => Ok(Detrend::Constant),
            "linear" => Ok(Detrend::Linear),
            _ => Err(ConfigError::InvalidArgument {
                arg: "detrend",
                reason: "detrend must be one of `none`, `constant`, `linear`",
            }),
        }
    }
}
