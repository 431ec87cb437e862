use core::{
    fmt::Debug,
    mem::size_of,
    ops::{Deref, Range},
};

/// A physical (or identity-mapped) MMIO window `[start, end)`.
pub struct IoRange {
    inner: Range<usize>,
}

impl IoRange {
    /// A window of `len` bytes at `start`, clipped at the end of the address space.
    pub const fn new(start: usize, len: usize) -> IoRange {
        IoRange {
            inner: start..start.saturating_add(len),
        }
    }

    /// Check whether a register block of type `T` can be laid over this range.
    pub fn validate<T: Sized>(&self, val_type: IoRangeValidationType) -> bool {
        let self_size = self.len();
        let size = size_of::<T>();
        match val_type {
            IoRangeValidationType::Fit => self_size == size,
            IoRangeValidationType::Compatible => self_size >= size,
        }
    }

    /// Validate the range for `T` and return its base address.
    pub fn base_for<T: Sized>(&self, val_type: IoRangeValidationType) -> Result<usize, MmioError> {
        if self.start == 0 || self.start % core::mem::align_of::<T>() != 0 {
            return Err(MmioError::InvalidAddress);
        }
        if !self.validate::<T>(val_type) {
            return Err(MmioError::NotEnoughSpace);
        }
        Ok(self.start)
    }
}

impl From<Range<usize>> for IoRange {
    fn from(value: Range<usize>) -> Self {
        IoRange { inner: value }
    }
}

impl Deref for IoRange {
    type Target = Range<usize>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Clone for IoRange {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl Debug for IoRange {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("[{:#x},{:#x})", self.start, self.end))
    }
}

pub enum IoRangeValidationType {
    /// The size of the IO range is exactly the same as the size of io memmap struct
    Fit,
    /// The size of the IO range equal or is greater than the size of io memmap struct
    Compatible,
}

/// MMIO window failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmioError {
    /// MMIO space is not enough.
    NotEnoughSpace,
    /// MMIO address is invalid or out of supported range.
    InvalidAddress,
}

impl core::fmt::Display for MmioError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MmioError::NotEnoughSpace => f.write_str("mmio window too small for register block"),
            MmioError::InvalidAddress => f.write_str("mmio base address is null or misaligned"),
        }
    }
}
