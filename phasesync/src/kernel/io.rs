use super::ConfigError;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1};

/// Adapter trait for reading contiguous 1D input.
pub trait Read1D<T> {
    /// Borrow the underlying input as a contiguous slice.
    fn read_slice(&self) -> Result<&[T], ConfigError>;
}

/// Adapter trait for writing contiguous 1D output.
pub trait Write1D<T> {
    /// Borrow the underlying output as a mutable contiguous slice.
    fn write_slice_mut(&mut self) -> Result<&mut [T], ConfigError>;
}

/// Adapter trait for `(epochs, samples)` shaped input.
///
/// Each epoch must be readable as a contiguous slice. Implementations do not
/// check that epochs share a length; the connectivity kernels validate that
/// against the epoch count they are asked to use.
pub trait ReadEpochs<T> {
    /// Number of epochs available.
    fn epoch_count(&self) -> usize;

    /// Borrow epoch `index` as a contiguous slice.
    fn read_epoch(&self, index: usize) -> Result<&[T], ConfigError>;
}

impl<T> Read1D<T> for [T] {
    fn read_slice(&self) -> Result<&[T], ConfigError> {
        Ok(self)
    }
}

impl<T> Write1D<T> for [T] {
    fn write_slice_mut(&mut self) -> Result<&mut [T], ConfigError> {
        Ok(self)
    }
}

impl<T, const N: usize> Read1D<T> for [T; N] {
    fn read_slice(&self) -> Result<&[T], ConfigError> {
        Ok(self)
    }
}

impl<T, const N: usize> Write1D<T> for [T; N] {
    fn write_slice_mut(&mut self) -> Result<&mut [T], ConfigError> {
        Ok(self)
    }
}

impl<T> Read1D<T> for Vec<T> {
    fn read_slice(&self) -> Result<&[T], ConfigError> {
        Ok(self.as_slice())
    }
}

impl<T> Write1D<T> for Vec<T> {
    fn write_slice_mut(&mut self) -> Result<&mut [T], ConfigError> {
        Ok(self.as_mut_slice())
    }
}

impl<T> Read1D<T> for Array1<T> {
    fn read_slice(&self) -> Result<&[T], ConfigError> {
        self.as_slice()
            .ok_or(ConfigError::NonContiguous { arg: "array" })
    }
}

impl<T> Write1D<T> for Array1<T> {
    fn write_slice_mut(&mut self) -> Result<&mut [T], ConfigError> {
        self.as_slice_mut()
            .ok_or(ConfigError::NonContiguous { arg: "array" })
    }
}

impl<'a, T> Read1D<T> for ArrayView1<'a, T> {
    fn read_slice(&self) -> Result<&[T], ConfigError> {
        self.as_slice()
            .ok_or(ConfigError::NonContiguous { arg: "array_view" })
    }
}

impl<'a, T> Write1D<T> for ArrayViewMut1<'a, T> {
    fn write_slice_mut(&mut self) -> Result<&mut [T], ConfigError> {
        self.as_slice_mut().ok_or(ConfigError::NonContiguous {
            arg: "array_view_mut",
        })
    }
}

fn epoch_out_of_range() -> ConfigError {
    ConfigError::InvalidArgument {
        arg: "epoch",
        reason: "epoch index out of range",
    }
}

impl<T> ReadEpochs<T> for [Vec<T>] {
    fn epoch_count(&self) -> usize {
        self.len()
    }

    fn read_epoch(&self, index: usize) -> Result<&[T], ConfigError> {
        self.get(index)
            .map(Vec::as_slice)
            .ok_or_else(epoch_out_of_range)
    }
}

impl<T> ReadEpochs<T> for Vec<Vec<T>> {
    fn epoch_count(&self) -> usize {
        self.len()
    }

    fn read_epoch(&self, index: usize) -> Result<&[T], ConfigError> {
        self.as_slice().read_epoch(index)
    }
}

impl<'s, T> ReadEpochs<T> for [&'s [T]] {
    fn epoch_count(&self) -> usize {
        self.len()
    }

    fn read_epoch(&self, index: usize) -> Result<&[T], ConfigError> {
        self.get(index).copied().ok_or_else(epoch_out_of_range)
    }
}

impl<T> ReadEpochs<T> for Array2<T> {
    fn epoch_count(&self) -> usize {
        self.nrows()
    }

    fn read_epoch(&self, index: usize) -> Result<&[T], ConfigError> {
        if index >= self.nrows() {
            return Err(epoch_out_of_range());
        }
        self.row(index)
            .to_slice()
            .ok_or(ConfigError::NonContiguous { arg: "epochs" })
    }
}

impl<'a, T> ReadEpochs<T> for ArrayView2<'a, T> {
    fn epoch_count(&self) -> usize {
        self.nrows()
    }

    fn read_epoch(&self, index: usize) -> Result<&[T], ConfigError> {
        if index >= self.nrows() {
            return Err(epoch_out_of_range());
        }
        self.row(index)
            .to_slice()
            .ok_or(ConfigError::NonContiguous { arg: "epochs_view" })
    }
}
