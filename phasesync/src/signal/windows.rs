//! Tapering windows applied to every spectral sub-segment.
//!
//! Windows follow `scipy.signal.get_window`: with `fftbins = true` (the
//! default for spectral estimation) the periodic form is produced by building
//! the symmetric window of length `nx + 1` and dropping the last sample.

use core::fmt;
use core::str::FromStr;

use num_traits::{Float, FloatConst};

use crate::kernel::ConfigError;

/// Window family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum Window {
    /// Rectangular window, all ones.
    #[default]
    Boxcar,
    /// Hann window.
    Hann,
    /// Hamming window.
    Hamming,
    /// Blackman window.
    Blackman,
    /// Bartlett window, zero at both ends.
    Bartlett,
    /// Triangular window, non-zero at the ends.
    Triang,
}

impl Window {
    /// scipy name of the window.
    pub fn name(self) -> &'static str {
        match self {
            Window::Boxcar => "boxcar",
            Window::Hann => "hann",
            Window::Hamming => "hamming",
            Window::Blackman => "blackman",
            Window::Bartlett => "bartlett",
            Window::Triang => "triang",
        }
    }

    /// Generate `nx` window samples.
    ///
    /// `fftbins = true` yields the periodic window used for spectral analysis,
    /// `false` the symmetric one used for filter design.
    pub fn generate<F>(self, nx: usize, fftbins: bool) -> Vec<F>
    where
        F: Float + FloatConst,
    {
        if nx <= 1 {
            return vec![F::one(); nx];
        }
        let m = if fftbins { nx + 1 } else { nx };
        let mut w = symmetric::<F>(self, m);
        w.truncate(nx);
        w
    }
}

fn cast<F: Float>(v: f64) -> F {
    F::from(v).unwrap_or_else(F::zero)
}

fn general_cosine<F>(m: usize, coeffs: &[f64]) -> Vec<F>
where
    F: Float + FloatConst,
{
    let denom = cast::<F>((m - 1) as f64);
    (0..m)
        .map(|n| {
            let phase = F::TAU() * cast::<F>(n as f64) / denom;
            coeffs
                .iter()
                .enumerate()
                .fold(F::zero(), |acc, (k, &a)| {
                    let term = cast::<F>(a) * (cast::<F>(k as f64) * phase).cos();
                    if k % 2 == 0 {
                        acc + term
                    } else {
                        acc - term
                    }
                })
        })
        .collect()
}

fn symmetric<F>(window: Window, m: usize) -> Vec<F>
where
    F: Float + FloatConst,
{
    match window {
        Window::Boxcar => vec![F::one(); m],
        Window::Hann => general_cosine(m, &[0.5, 0.5]),
        Window::Hamming => general_cosine(m, &[0.54, 0.46]),
        Window::Blackman => general_cosine(m, &[0.42, 0.50, 0.08]),
        Window::Bartlett => {
            let half = cast::<F>((m - 1) as f64);
            let two = cast::<F>(2.0);
            (0..m)
                .map(|n| {
                    let n = cast::<F>(n as f64);
                    if n <= half / two {
                        two * n / half
                    } else {
                        two - two * n / half
                    }
                })
                .collect()
        }
        Window::Triang => {
            let rise: Vec<F> = (1..=m.div_ceil(2))
                .map(|n| {
                    let n = n as f64;
                    if m % 2 == 0 {
                        cast((2.0 * n - 1.0) / m as f64)
                    } else {
                        cast(2.0 * n / (m as f64 + 1.0))
                    }
                })
                .collect();
            let fall = if m % 2 == 0 {
                rise.iter().rev().copied().collect::<Vec<_>>()
            } else {
                rise.iter().rev().skip(1).copied().collect::<Vec<_>>()
            };
            rise.into_iter().chain(fall).collect()
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Window {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "boxcar" | "box" | "rect" | "rectangular" | "ones" => Ok(Window::Boxcar),
            "hann" | "hanning" => Ok(Window::Hann),
            "hamming" | "hamm" => Ok(Window::Hamming),
            "blackman" | "black" => Ok(Window::Blackman),
            "bartlett" | "bart" => Ok(Window::Bartlett),
            "triang" | "triangle" | "tri" => Ok(Window::Triang),
            _ => Err(ConfigError::InvalidArgument {
                arg: "window",
                reason: "unknown window name",
            }),
        }
    }
}
