//! Memory-mapped I/O primitives shared by device drivers.
#![cfg_attr(not(test), no_std)]

pub mod range;
pub mod reg;

pub use range::{IoRange, IoRangeValidationType, MmioError};
pub use reg::Register;
