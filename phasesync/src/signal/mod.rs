//! Signal-processing primitives consumed by the connectivity measures.

pub mod detrend;
pub mod spectral;
pub mod traits;
pub mod windows;
