use hexagon_dtype::ext::HasDType;
use hexagon_dtype::{DType, Device};
use smallvec::SmallVec;

use crate::buffer::{DataPtr, flat_size};
use crate::error::Result;

/// Borrowed view of a tensor as the host runtime describes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorDesc {
    pub data: DataPtr,
    pub device: Device,
    pub shape: SmallVec<[i64; 4]>,
    /// `None` means compact row-major.
    pub strides: Option<SmallVec<[i64; 4]>>,
    pub dtype: DType,
    pub byte_offset: u64,
}

impl TensorDesc {
    pub fn new(data: DataPtr, device: Device, shape: &[i64], dtype: DType) -> Self {
        Self { data, device, shape: SmallVec::from_slice(shape), strides: None, dtype, byte_offset: 0 }
    }

    /// Describe host memory owned by the caller as a CPU tensor.
    pub fn host<T: HasDType>(data: &[T], shape: &[i64]) -> Self {
        Self::new(DataPtr::from_ptr(data.as_ptr()), Device::cpu(), shape, T::DTYPE)
    }

    /// Like [`Self::host`], for a copy destination.
    pub fn host_mut<T: HasDType>(data: &mut [T], shape: &[i64]) -> Self {
        Self::new(DataPtr::from_ptr(data.as_mut_ptr()), Device::cpu(), shape, T::DTYPE)
    }

    pub fn with_strides(mut self, strides: &[i64]) -> Self {
        self.strides = Some(SmallVec::from_slice(strides));
        self
    }

    pub fn with_byte_offset(mut self, byte_offset: u64) -> Self {
        self.byte_offset = byte_offset;
        self
    }

    /// Number of elements. Negative extents and overflowing products fail
    /// with `InvalidShape`.
    pub fn numel(&self) -> Result<usize> {
        flat_size(&self.shape, 1)
    }

    /// Bytes covered by the tensor's elements.
    pub fn data_size(&self) -> Result<usize> {
        flat_size(&self.shape, self.dtype.bytes())
    }

    /// True if `strides` is absent or describes compact row-major order.
    /// Extents of 1 may carry any stride.
    pub fn is_contiguous(&self) -> bool {
        let Some(strides) = &self.strides else {
            return true;
        };
        if strides.len() != self.shape.len() {
            return false;
        }

        let mut expected = 1i64;
        for (&extent, &stride) in self.shape.iter().zip(strides.iter()).rev() {
            if extent != 1 && stride != expected {
                return false;
            }
            match expected.checked_mul(extent) {
                Some(next) => expected = next,
                None => return false,
            }
        }
        true
    }
}
